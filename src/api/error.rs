//! API error handling for consistent JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::meeting::EndRejection;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<EndRejection>() {
            Some(EndRejection::Validation(msg)) => Self::bad_request(msg.clone()),
            Some(EndRejection::NotFound(msg)) => Self::not_found(msg.clone()),
            None => Self::internal(err.to_string()),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_map_to_client_errors() {
        let validation: anyhow::Error =
            EndRejection::Validation("room mismatch".to_string()).into();
        let err = ApiError::from(validation);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let missing: anyhow::Error = EndRejection::NotFound("no meeting".to_string()).into();
        let err = ApiError::from(missing);
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let other = anyhow::anyhow!("db on fire");
        let err = ApiError::from(other);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
