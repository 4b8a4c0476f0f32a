//! Session endpoints: create, inspect, delete, and read transcripts and
//! tasks.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use ca_domain::ids::{SessionId, UserId};

use super::{api_error, bad_body, dto, error_response};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let Some(raw) = body.user_id.filter(|u| !u.trim().is_empty()) else {
        return api_error(StatusCode::BAD_REQUEST, "user_id is required");
    };
    let user_id = match UserId::new(raw) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    match state.orchestrator.create_session(&user_id).await {
        Ok(session) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "session": dto::SessionDto::from(&session),
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /sessions/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = match SessionId::new(id) {
        Ok(id) => state.orchestrator.get_session(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(session) => Json(serde_json::json!({
            "success": true,
            "session": dto::SessionDto::from(&session),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = match SessionId::new(id) {
        Ok(id) => state.orchestrator.delete_session(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_messages(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = match SessionId::new(id) {
        Ok(id) => state.orchestrator.get_conversation(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(messages) => Json(serde_json::json!({
            "success": true,
            "messages": dto::messages(&messages),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_tasks(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = match SessionId::new(id) {
        Ok(id) => state.orchestrator.get_session_tasks(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(tasks) => Json(serde_json::json!({
            "success": true,
            "tasks": dto::tasks(&tasks),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
