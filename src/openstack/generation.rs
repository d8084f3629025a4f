//! Selection of the block-storage API generation.

use std::fmt::Display;

use tracing::{info, warn};

use super::api::ApiGeneration;

/// Chooses the API generation from the outcome of constructing a client for
/// the newer API. Failure is not an error: the driver falls back to the
/// older generation and records why.
pub(crate) fn select_generation<C, E: Display>(
    newer: Result<C, E>,
) -> (Option<C>, ApiGeneration) {
    match newer {
        Ok(client) => {
            info!(generation = %ApiGeneration::V2, "block storage API selected");
            (Some(client), ApiGeneration::V2)
        }
        Err(err) => {
            warn!(error = %err, "block storage API v2 not available, falling back to v1");
            (None, ApiGeneration::V1)
        }
    }
}
