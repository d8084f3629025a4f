//! Error types for the host executor.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while resolving the host identity.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IdentityError {
    /// Raised when a single discovery source cannot produce an id.
    #[error("{origin}: {message}")]
    SourceUnavailable {
        /// Name of the failing source.
        origin: String,
        /// Underlying cause.
        message: String,
    },
    /// Raised when every source failed. Failures are kept in priority order.
    #[error("{}", render_failures(.failures))]
    AllSourcesFailed {
        /// One failure per source, in the order the sources were tried.
        failures: Vec<IdentityError>,
    },
}

impl IdentityError {
    pub(crate) fn unavailable(origin: &str, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            origin: origin.to_owned(),
            message: message.into(),
        }
    }
}

fn render_failures(failures: &[IdentityError]) -> String {
    if failures.is_empty() {
        return String::from("no identity sources configured");
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ; ")
}

/// Errors raised by the executor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExecutorError {
    /// Raised when a local file cannot be read.
    #[error("error reading file {path}: {message}")]
    Io {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Error reported by the operating system.
        message: String,
    },
    /// Raised for operations this executor does not implement.
    #[error("{operation} is not supported by the openstack executor")]
    NotSupported {
        /// Operation requested by the caller.
        operation: String,
    },
    /// Raised when identity resolution fails.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
