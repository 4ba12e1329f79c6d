use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::GatewayError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Error returned by every handler. Rendered as `{"detail": message}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    BadRequest(String),

    /// Request body or query string that could not be extracted
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Rejected { status, .. } => *status,
            Self::Gateway(e) => match e {
                GatewayError::Validation(_) | GatewayError::ForeignKeyViolation { .. } => {
                    StatusCode::BAD_REQUEST
                }
                GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
                GatewayError::BackendUnavailable { .. } | GatewayError::Cancelled => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                GatewayError::Backend { .. } | GatewayError::PartialWrite { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message for the response body; backend error text is never included
    pub fn detail(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::Rejected { detail, .. } => detail.clone(),
            Self::Gateway(e) => e.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Backend;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GatewayError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (GatewayError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                GatewayError::ForeignKeyViolation {
                    device_id: "d".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::unavailable(Backend::TimeSeries, "down"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::backend(Backend::ObjectStore, "boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GatewayError::PartialWrite {
                    succeeded: 1,
                    failed: 1,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (GatewayError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_detail_hides_backend_text() {
        let err = ApiError::from(GatewayError::backend(
            Backend::Relational,
            "FATAL: password authentication failed for user \"postgres\"",
        ));
        assert_eq!(err.detail(), "relational backend request failed");
    }
}
