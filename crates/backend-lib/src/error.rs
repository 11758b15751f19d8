// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already in use")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    AuthenticationFailure,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::AuthenticationFailure | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded | AppError::AuthRateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "VAL_001",
            AppError::DuplicateEmail => "USER_001",
            AppError::AuthenticationFailure => "AUTH_001",
            AppError::InvalidOrExpiredToken => "AUTH_002",
            AppError::Unauthenticated => "AUTH_003",
            AppError::AuthRateLimited => "AUTH_004",
            AppError::Forbidden(_) => "AUTHZ_001",
            AppError::NotFound(_) => "NF_001",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::Hashing(_) => "CRED_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::DuplicateEmail => "Email already in use".to_string(),
            AppError::AuthenticationFailure => "Invalid email or password".to_string(),
            AppError::InvalidOrExpiredToken => "Invalid or expired token".to_string(),
            AppError::Unauthenticated => "Authentication required".to_string(),
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::Forbidden(_) => "Not authorized".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::Hashing(_) | AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<scrypt::password_hash::Error> for AppError {
    fn from(err: scrypt::password_hash::Error) -> Self {
        AppError::Hashing(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
