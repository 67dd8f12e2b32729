use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Body of every 429 produced by the rate limiter.
pub const RATE_LIMIT_MESSAGE: &str = "You have reached the limit of requests allowed per minute. \
     Please wait one minute and try again later.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("rate limiter store unavailable")]
    RateLimiterUnavailable,

    #[error("no token provided")]
    NotAuthenticated,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("username or email already registered")]
    UserExists,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("token encoding failed: {0}")]
    TokenEncoding(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub detail: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::RateLimiterUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotAuthenticated | AppError::InvalidToken | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::UserExists | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::PasswordHash(_) | AppError::TokenEncoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::RateLimitExceeded => RATE_LIMIT_MESSAGE.to_string(),
            AppError::RateLimiterUnavailable => {
                "Rate limiting is temporarily unavailable, please try again later.".to_string()
            }
            AppError::NotAuthenticated => "Not authenticated, No token provided".to_string(),
            AppError::InvalidToken => "Invalid or expired token".to_string(),
            AppError::InvalidCredentials => {
                "Invalid credentials, please check your username and password".to_string()
            }
            AppError::UserExists => "Username or email already registered".to_string(),
            AppError::NotFound(msg) | AppError::Validation(msg) => msg.clone(),
            // Internals are logged, never echoed to the caller.
            AppError::Database(_) | AppError::PasswordHash(_) | AppError::TokenEncoding(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            detail: self.detail(),
        });

        (status, body).into_response()
    }
}
