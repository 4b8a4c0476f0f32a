use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};

use ca_domain::ids::UserId;

use super::{dto, error_response};
use crate::state::AppState;

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = match UserId::new(id) {
        Ok(id) => state.orchestrator.get_user(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(user) => Json(serde_json::json!({
            "success": true,
            "user": dto::UserDto::from(&user),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_user_sessions(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = match UserId::new(id) {
        Ok(id) => state.orchestrator.get_user_sessions(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(sessions) => Json(serde_json::json!({
            "success": true,
            "sessions": dto::sessions(&sessions),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
