use crate::application::query_cache::QueryError;
use crate::domain::models::repository::InvalidRepositoryRef;
use crate::infrastructures::adapters::primary::views::pages::{
    access_denied_page, error_page,
};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Failures on HTML routes, rendered as error pages.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("access denied")]
    AccessDenied(Option<String>),

    #[error("failed to load data from GitHub: {0}")]
    LoadFailed(QueryError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    InvalidRepository(#[from] InvalidRepositoryRef),

    #[error("the selected repository changed while its runs were loading")]
    SelectionChanged,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::AccessDenied(detail) => (
                StatusCode::UNAUTHORIZED,
                Html(access_denied_page(detail.as_deref())),
            )
                .into_response(),
            PageError::LoadFailed(e) => {
                tracing::error!("Failed to load page data: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    Html(error_page(
                        "Something went wrong",
                        "GitHub could not be reached. Try again in a moment.",
                    )),
                )
                    .into_response()
            }
            PageError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Html(error_page("Bad request", &message)),
            )
                .into_response(),
            PageError::InvalidRepository(e) => (
                StatusCode::BAD_REQUEST,
                Html(error_page("Bad request", &e.to_string())),
            )
                .into_response(),
            PageError::SelectionChanged => (
                StatusCode::CONFLICT,
                Html(error_page(
                    "Selection changed",
                    "Another repository was opened in this session while these runs were loading. Reload to try again.",
                )),
            )
                .into_response(),
        }
    }
}

/// Failures on JSON routes, rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("access denied")]
    Unauthorized,

    #[error("failed to load data from GitHub")]
    LoadFailed(QueryError),

    #[error(transparent)]
    InvalidRepository(#[from] InvalidRepositoryRef),

    #[error("the selected repository changed while its runs were loading")]
    SelectionChanged,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::LoadFailed(e) => {
                tracing::error!("Failed to load data: {}", e);
                StatusCode::BAD_GATEWAY
            }
            ApiError::InvalidRepository(_) => StatusCode::BAD_REQUEST,
            ApiError::SelectionChanged => StatusCode::CONFLICT,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
