//! Error types for the OpenStack driver.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::RequestError;

/// Failure of a single provider call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// Raised when the request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// Raised when the provider answers with a non-success status.
    #[error("provider returned status {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the provider.
        message: String,
    },
    /// Raised when a response body does not match the expected shape.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
    /// Raised when the service catalog has no usable endpoint.
    #[error("no public {service} endpoint in the service catalog")]
    MissingEndpoint {
        /// Catalog service type, for example `volumev2`.
        service: String,
    },
    /// Raised when Keystone accepts the credentials but returns no token.
    #[error("identity service response carried no token")]
    MissingToken,
}

/// Errors raised by the OpenStack driver.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DriverError {
    /// Raised when the configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a request fails validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Raised when a required identifier is empty.
    #[error("no {field} specified")]
    NotFound {
        /// Name of the missing identifier.
        field: String,
    },
    /// Raised when the driver cannot be initialised. Fatal for the instance.
    #[error("{stage}: {source}")]
    Init {
        /// Initialisation step that failed.
        stage: String,
        /// Underlying provider failure.
        source: ProviderError,
    },
    /// Raised when a provider call fails.
    #[error("error {operation}{}: {source}", describe_resource(.resource_id))]
    Provider {
        /// Operation being performed, for example `creating volume`.
        operation: String,
        /// Identifier the operation targeted; empty for list calls.
        resource_id: String,
        /// Underlying provider failure.
        source: ProviderError,
    },
    /// Raised when a poll deadline elapses before the target state.
    #[error("timeout after {timeout:?} waiting for {action} of {resource_id}")]
    Timeout {
        /// State transition being awaited.
        action: String,
        /// Resource being polled.
        resource_id: String,
        /// Budget that elapsed.
        timeout: Duration,
    },
    /// Raised when a detach cannot converge, even after any forced fallback.
    #[error(
        "unexpected error when detaching volume {volume_id} from instance {instance_id}; manual intervention may be required: {source}"
    )]
    Unreconciled {
        /// Volume that is still attached.
        volume_id: String,
        /// Instance the detach was scoped to.
        instance_id: String,
        /// Failure of the last poll that was attempted.
        source: Box<DriverError>,
    },
    /// Raised for operations the provider does not implement.
    #[error("{operation} is not supported by the openstack driver")]
    NotSupported {
        /// Operation requested by the caller.
        operation: String,
    },
    /// Raised when the source of a volume copy cannot be inspected.
    #[error("error getting reference volume {volume_id} for volume copy")]
    CopySource {
        /// Source volume requested by the caller.
        volume_id: String,
    },
    /// Raised when a poll loop is stopped through the driver's cancel
    /// handle.
    #[error("cancelled while waiting for {action} of {resource_id}")]
    Cancelled {
        /// State transition being awaited.
        action: String,
        /// Resource being polled.
        resource_id: String,
    },
}

fn describe_resource(resource_id: &str) -> String {
    if resource_id.is_empty() {
        String::new()
    } else {
        format!(" {resource_id}")
    }
}

impl DriverError {
    pub(crate) fn provider(operation: &str, resource_id: &str, source: ProviderError) -> Self {
        Self::Provider {
            operation: operation.to_owned(),
            resource_id: resource_id.to_owned(),
            source,
        }
    }

    pub(crate) fn init(stage: &str, source: ProviderError) -> Self {
        Self::Init {
            stage: stage.to_owned(),
            source,
        }
    }
}

impl From<RequestError> for DriverError {
    fn from(value: RequestError) -> Self {
        Self::InvalidRequest(value.to_string())
    }
}

impl From<ConfigError> for DriverError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_names_operation_and_resource() {
        let err = DriverError::provider(
            "getting volume",
            "vol-1",
            ProviderError::Http {
                status: 404,
                message: String::from("not found"),
            },
        );
        assert_eq!(
            err.to_string(),
            "error getting volume vol-1: provider returned status 404: not found"
        );
    }

    #[test]
    fn provider_error_omits_empty_resource() {
        let err = DriverError::provider(
            "listing volumes",
            "",
            ProviderError::Transport(String::from("connection refused")),
        );
        assert_eq!(
            err.to_string(),
            "error listing volumes: transport error: connection refused"
        );
    }

    #[test]
    fn unreconciled_renders_its_cause() {
        let err = DriverError::Unreconciled {
            volume_id: String::from("vol-1"),
            instance_id: String::from("srv-1"),
            source: Box::new(DriverError::provider(
                "getting volume",
                "vol-1",
                ProviderError::Http {
                    status: 401,
                    message: String::from("token expired"),
                },
            )),
        };
        let rendered = err.to_string();
        assert!(
            rendered.starts_with("unexpected error when detaching volume vol-1 from instance srv-1"),
            "{rendered}"
        );
        assert!(rendered.ends_with("status 401: token expired"), "{rendered}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
