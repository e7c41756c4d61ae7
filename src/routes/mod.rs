pub mod about;
pub mod admin;
pub mod assets;
pub mod auth;
pub mod media;
pub mod posts;

use askama::Template;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::not_found_response;
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_response(body),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// 200 response for an already rendered page.
pub fn html_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Full application router with every route, the 404 fallback and the trace layer.
pub fn app(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes();

    Router::new()
        .merge(posts::router())
        .merge(about::router())
        .merge(auth::router())
        .merge(admin::router())
        .route("/media/{*path}", get(media::serve))
        .route("/assets/{*path}", get(assets::serve))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> Response {
    not_found_response()
}
