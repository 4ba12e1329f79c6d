use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The external system an operation was routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    TimeSeries,
    Relational,
    ObjectStore,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeSeries => "time-series",
            Self::Relational => "relational",
            Self::ObjectStore => "object-store",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway-level errors
///
/// Every backend fault is converted into one of these at the adapter
/// boundary. Nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Device {device_id} has no metadata")]
    ForeignKeyViolation { device_id: String },

    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable { backend: Backend, message: String },

    #[error("{backend} backend error: {message}")]
    Backend { backend: Backend, message: String },

    #[error("Partial write: {succeeded} succeeded, {failed} failed")]
    PartialWrite { succeeded: usize, failed: usize },

    #[error("Operation cancelled")]
    Cancelled,
}

impl GatewayError {
    pub fn unavailable(backend: Backend, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            message: message.into(),
        }
    }

    pub fn backend(backend: Backend, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Message safe to show to API callers. Backend error text stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::BackendUnavailable { backend, .. } => {
                format!("{} backend unavailable", backend)
            }
            Self::Backend { backend, .. } => format!("{} backend request failed", backend),
            other => other.to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::ForeignKeyViolation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_message_hides_backend_text() {
        let err = GatewayError::backend(Backend::Relational, "password authentication failed");
        assert_eq!(err.public_message(), "relational backend request failed");

        let err = GatewayError::unavailable(Backend::TimeSeries, "connection refused 10.0.0.3");
        assert_eq!(err.public_message(), "time-series backend unavailable");
    }

    #[test]
    fn test_public_message_keeps_client_errors() {
        let err = GatewayError::ForeignKeyViolation {
            device_id: "device_9".to_string(),
        };
        assert_eq!(err.public_message(), "Device device_9 has no metadata");
        assert!(err.is_client_error());
        assert!(!GatewayError::Cancelled.is_client_error());
    }
}
