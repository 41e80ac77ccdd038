pub mod stable;

use crate::store::VersionStore;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, Router},
};
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VersionStore>,
    pub repository_url: Arc<str>,
}

pub fn build(state: AppState) -> Router {
    Router::new()
        .fallback(fallback)
        .route("/", get(repository_redirect))
        .route("/health", get(health))
        .nest("/stable", stable::build())
        .with_state(state)
}

async fn repository_redirect(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.repository_url.to_string())],
    )
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.store.is_initialized() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no version cached yet")
    }
}

/// Anything outside the known routes is sent to the repository, same as `/`.
async fn fallback(uri: axum::http::Uri, state: State<AppState>) -> impl IntoResponse {
    trace!("No route for URI: {}; redirecting to repository", uri);
    repository_redirect(state).await
}
