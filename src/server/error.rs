//! API error envelope.
//!
//! Every failure leaves the server as
//! `{success: false, error: {message, code, status, details?}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::scrapers::ScrapeError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code: "CONFLICT",
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "message": self.message,
            "code": self.code,
            "status": self.status.as_u16(),
        });
        if let Some(details) = self.details {
            error["details"] = details;
        }
        (
            self.status,
            Json(json!({ "success": false, "error": error })),
        )
            .into_response()
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::AlreadyRunning => Self {
                status: StatusCode::CONFLICT,
                code: "ALREADY_RUNNING",
                message: err.to_string(),
                details: None,
            },
            ScrapeError::UnknownAdapter(_) => Self::not_found(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<crate::repository::Error> for ApiError {
    fn from(err: crate::repository::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_mapping() {
        let conflict = ApiError::from(ScrapeError::AlreadyRunning);
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.code, "ALREADY_RUNNING");

        let missing = ApiError::from(ScrapeError::UnknownAdapter("x".to_string()));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let internal = ApiError::from(ScrapeError::Cancelled);
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
