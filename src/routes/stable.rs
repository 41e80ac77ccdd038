use super::AppState;
use crate::script::render_install_script;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, Router},
};

pub fn build() -> Router<AppState> {
    Router::new()
        .route("/version", get(version))
        .route("/install.sh", get(install_script))
}

async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let tag = state.store.get();
    // Fixed `": "` spacing; the tag itself is JSON-escaped.
    let body = format!(
        r#"{{"version": {}}}"#,
        serde_json::Value::from(tag.as_str())
    );

    ([(header::CONTENT_TYPE, "application/json")], body)
}

async fn install_script(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_install_script(&state.store.get()),
    )
}
