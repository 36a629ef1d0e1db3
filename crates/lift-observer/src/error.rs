//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lift_core::CommandRejection;

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An invalid path or query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The building refused a button press.
    #[error("{0}")]
    Rejected(#[from] CommandRejection),
}

impl ObserverError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Rejected(CommandRejection::UnknownCar { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidQuery(_)
            | Self::Rejected(
                CommandRejection::FloorOutOfRange { .. } | CommandRejection::InvalidDirection { .. },
            ) => StatusCode::BAD_REQUEST,
            Self::Rejected(
                CommandRejection::OutOfService { .. } | CommandRejection::AlreadyAtFloor { .. },
            ) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound(msg) | Self::InvalidQuery(msg) => msg,
            Self::Rejected(rejection) => rejection.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
