//! Read-only static serving of uploaded images.

use axum::Router;
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Serve the blob directory under the configured URL prefix, so a stored
/// `image` path is also its URL.
pub fn router(state: &AppState) -> Router {
    Router::new().nest_service(
        &state.config.uploads.url_prefix,
        ServeDir::new(state.blobs.root()),
    )
}
