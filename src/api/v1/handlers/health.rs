/*
 * Responsibility
 * - GET /health (疎通用)
 * - キャッシュは best-effort なので、落ちていても 200 を返し状態だけ載せる
 */
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cache = match state.cache.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(backend = state.cache.backend_name(), error = %e, "cache ping failed");
            "unavailable"
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "cache": {
                "backend": state.cache.backend_name(),
                "status": cache,
            },
        })),
    )
}
