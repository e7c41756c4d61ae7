use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::not_found_response;
use crate::media;
use crate::state::AppState;

/// GET /media/{*path} - uploaded files, straight from the media root.
pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let Some(file) = media::resolve(&state.config.media_path(), &path) else {
        return not_found_response();
    };

    match tokio::fs::read(&file).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                data,
            )
                .into_response()
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not read media file {}: {}", file.display(), e);
            }
            not_found_response()
        }
    }
}
