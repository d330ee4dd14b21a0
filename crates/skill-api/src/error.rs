use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Terminal outcomes of a rejected webhook call.
///
/// Every variant maps to a status with an empty body.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("method not allowed")]
    BadMethod,

    /// Answered with 500, not 400.
    #[error("request body is not a valid webhook request")]
    MalformedBody,

    #[error("unsupported request type")]
    UnsupportedType,

    #[error("unknown timezone")]
    InvalidTimezone,

    #[error("message store unavailable")]
    StoreUnavailable,

    #[error("cannot serialize response")]
    SerializationFailure,
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadMethod => StatusCode::METHOD_NOT_ALLOWED,
            Self::MalformedBody => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnsupportedType => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidTimezone => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SerializationFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
