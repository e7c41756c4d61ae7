use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use crate::repository::RepositoryError;

/// Rendered for every 404, including unmatched routes.
#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub viewer: Option<crate::extractors::CurrentUser>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Login required for {next}")]
    LoginRequired { next: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => AppError::NotFound,
            other => AppError::Repository(other),
        }
    }
}

/// Login URL carrying the path to come back to. `/` stays readable, the rest
/// is form-encoded.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login/?next={}", encoded.replace("%2F", "/"))
}

pub fn not_found_response() -> Response {
    match (NotFoundTemplate { viewer: None }).render() {
        Ok(body) => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::NotFound => return not_found_response(),
            AppError::LoginRequired { next } => {
                return Redirect::to(&login_url(next)).into_response()
            }
            AppError::BadRequest(msg) => {
                return (StatusCode::BAD_REQUEST, msg.clone()).into_response()
            }
            AppError::Database(e) => format!("Database error: {}", e),
            AppError::Pool(e) => format!("Pool error: {}", e),
            AppError::Repository(e) => format!("Repository error: {}", e),
            AppError::Template(e) => format!("Template error: {}", e),
            AppError::Io(e) => format!("IO error: {}", e),
            AppError::Internal(msg) => format!("Internal error: {}", msg),
        };

        tracing::error!("{}", message);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
