use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid selection: {0}")]
    Validation(String),

    /// Every discovery strategy failed and nothing was collected
    #[error("{message}")]
    ApiFailure { message: String, detail: String },

    /// Discovery worked but nothing satisfied the selection
    #[error("No content found: {0}")]
    NoContent(String),

    #[error("A spin is already in progress for this session")]
    SpinInProgress,

    #[error("No spins remaining in this session")]
    SpinsExhausted,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code surfaced to clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::ApiFailure { .. } => "API_FAILURE",
            AppError::NoContent(_) => "NO_CONTENT",
            AppError::SpinInProgress => "SPIN_IN_PROGRESS",
            AppError::SpinsExhausted => "SPINS_EXHAUSTED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::HttpClient(_) | AppError::ExternalApi(_) => "UPSTREAM_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NoContent(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SpinInProgress => StatusCode::CONFLICT,
            AppError::SpinsExhausted => StatusCode::TOO_MANY_REQUESTS,
            AppError::ApiFailure { .. } | AppError::HttpClient(_) | AppError::ExternalApi(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Cache(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::ApiFailure { message, detail } => json!({
                "error": message,
                "code": code,
                "detail": detail,
            }),
            other => json!({
                "error": other.to_string(),
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
