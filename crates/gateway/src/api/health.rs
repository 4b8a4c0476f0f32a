use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /health`: liveness plus a few counters.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "provider": {
            "id": state.provider.provider_id(),
            "default_model": state.provider.default_model(),
        },
        "store": state.store.stats(),
        "skills": state.skills.list().len(),
        "schedules": state.schedules.len(),
    }))
}
