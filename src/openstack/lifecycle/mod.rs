//! Reconciliation of volumes, snapshots, and attachments against the
//! provider.
//!
//! Every mutating call is issued once and followed by a poll that waits for
//! the provider to report the desired state. Polls sleep between checks and
//! stop early when the calls in flight are cancelled through the driver's
//! [`CancelHandle`](super::CancelHandle).

mod query;
mod snapshot;
mod volume_attach;
mod volume_create;
mod volume_detach;
mod wait;

use super::DriverError;

pub(super) fn require_id(value: &str, field: &str) -> Result<(), DriverError> {
    if value.trim().is_empty() {
        return Err(DriverError::NotFound {
            field: field.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
