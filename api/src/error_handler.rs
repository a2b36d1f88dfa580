use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chat_review::{ConfigurationError, RenderError};
use thiserror::Error;

use crate::core::http::response_envelope::{ApiErrorDetail, ApiResponse};

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    // --- IO / network / server ---
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / pipeline ---
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        details: Vec<ApiErrorDetail>,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("background task failed: {0}")]
    Join(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            details: Vec::new(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Config(ConfigurationError::NoImages) => StatusCode::BAD_REQUEST,
            AppError::Config(_) | AppError::Bind { .. } | AppError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Render(_) | AppError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(ConfigurationError::NoImages) => "NO_IMAGES",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Bind { .. } => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest { .. } => "BAD_REQUEST",
            AppError::Render(_) => "RENDER_ERROR",
            AppError::Join(_) => "TASK_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        }
        let details = match self {
            AppError::BadRequest { details, .. } => details,
            _ => Vec::new(),
        };
        ApiResponse::<()>::error(code, message, details).into_response_with_status(status)
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::bad_request(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_and_codes() {
        let e = AppError::bad_request("images: empty");
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.error_code(), "BAD_REQUEST");

        let e = AppError::from(ConfigurationError::NoImages);
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.error_code(), "NO_IMAGES");

        let e = AppError::from(RenderError::NoPages);
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
