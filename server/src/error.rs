//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use radio_engine::ControlError;
use radio_ipc::ErrorBody;
use radio_transport::TransportError;

/// Error returned by a request handler.
#[derive(Debug)]
pub enum ApiError {
    /// The request body or path was malformed.
    BadRequest(String),

    /// The addressed resource does not exist.
    NotFound(String),

    /// The relay failed to carry out a valid request.
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> String {
        match self {
            Self::BadRequest(m) | Self::NotFound(m) | Self::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::SessionNotFound(_) => Self::NotFound(err.to_string()),
            _ if err.is_client_error() => Self::BadRequest(err.to_string()),
            _ => {
                warn!("Session negotiation failed: {}", err);
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        Self::Internal(format!("Failed to change genre: {err}"))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("Invalid request body: {err}"))
    }
}
