//! HTTP error responses
//!
//! Every failure leaves the server as `{"error": "..."}` with a status code
//! chosen by the error class. Internal details are logged, not returned.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::utils::error::PaddyError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Identifier is not syntactically valid
    #[error("{0}")]
    InvalidId(String),

    /// Upload is not an image
    #[error("{0}")]
    InvalidContentType(String),

    /// Any other malformed request
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Request body over the configured limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Model, storage or runtime failure
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidId(_) | ApiError::InvalidContentType(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PaddyError> for ApiError {
    fn from(err: PaddyError) -> Self {
        match err {
            PaddyError::InvalidImage(msg) => {
                ApiError::InvalidContentType(format!("uploaded file is not a readable image: {}", msg))
            }
            PaddyError::InvalidInput(msg) => ApiError::BadRequest(msg),
            PaddyError::NotFound(what) => ApiError::NotFound(format!("not found: {}", what)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge(err.body_text());
        }
        ApiError::BadRequest(format!("invalid multipart upload: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!("expected a multipart/form-data upload: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
