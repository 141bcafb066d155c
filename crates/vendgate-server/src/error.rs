//! HTTP error types for the `vendgate` gateway.
//!
//! Maps sanitizer and forwarder errors into HTTP responses. Every error
//! produces a JSON body with a machine-readable `error` field (one of the
//! [`GatewayErrorCode`] wire codes) and a human-readable `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use vendgate_core::error::{GatewayErrorCode, SanitizeError};

use crate::forwarder::ForwardError;
use crate::upstream::UpstreamError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Caller credential mismatch.
    Unauthorized(String),
    /// `params` could not be reduced to Base64.
    MalformedParams(String),
    /// Required envelope fields absent.
    MissingFields(String),
    /// `encrypt` is not `AES`.
    UnsupportedEncryption(String),
    /// The body is not JSON.
    InvalidBody(String),
    /// Vendor unreachable; `timed_out` selects 504 over 502.
    UpstreamUnreachable { message: String, timed_out: bool },
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    /// The wire code for this error.
    pub fn code(&self) -> GatewayErrorCode {
        match self {
            Self::Unauthorized(_) => GatewayErrorCode::Unauthorized,
            Self::MalformedParams(_) => GatewayErrorCode::MalformedParams,
            Self::MissingFields(_) => GatewayErrorCode::MissingFields,
            Self::UnsupportedEncryption(_) => GatewayErrorCode::UnsupportedEncryption,
            Self::InvalidBody(_) => GatewayErrorCode::InvalidBody,
            Self::UpstreamUnreachable { .. } => GatewayErrorCode::UpstreamUnreachable,
            Self::Internal(_) => GatewayErrorCode::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            // Validation failures are all 400: the request must change.
            Self::Unauthorized(msg)
            | Self::MalformedParams(msg)
            | Self::MissingFields(msg)
            | Self::UnsupportedEncryption(msg)
            | Self::InvalidBody(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::UpstreamUnreachable { message, timed_out } => {
                let status = if timed_out {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, message)
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "gateway internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        let body = ErrorBody {
            error: code.as_str(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SanitizeError> for AppError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::MalformedParams { .. } => Self::MalformedParams(err.to_string()),
        }
    }
}

impl From<ForwardError> for AppError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Unauthorized => Self::Unauthorized(err.to_string()),
            ForwardError::MissingFields { .. } => Self::MissingFields(err.to_string()),
            ForwardError::UnsupportedEncryption { .. } => {
                Self::UnsupportedEncryption(err.to_string())
            }
            ForwardError::MalformedParams(inner) => inner.into(),
            ForwardError::UpstreamUnreachable(ref inner) => Self::UpstreamUnreachable {
                timed_out: matches!(inner, UpstreamError::Timeout { .. }),
                message: err.to_string(),
            },
        }
    }
}
