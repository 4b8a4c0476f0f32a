//! Skill registry endpoints and `POST /skills/execute`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{Map, Value};

use ca_domain::error::Error;
use ca_domain::ids::SessionId;
use ca_domain::model::SkillRecord;

use super::{api_error, bad_body, dto, error_response};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_skills(State(state): State<AppState>) -> Response {
    match state.runtime.list().await {
        Ok(records) => {
            let skills: Vec<dto::SkillDto> = records.iter().map(dto::SkillDto::from).collect();
            Json(serde_json::json!({
                "success": true,
                "count": skills.len(),
                "skills": skills,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn get_skill(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.runtime.get_skill(&name).await {
        Ok(record) => Json(serde_json::json!({
            "success": true,
            "skill": dto::SkillDto::from(&record),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterSkillBody {
    pub name: String,
    pub version: String,
    pub location: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

pub async fn register_skill(
    State(state): State<AppState>,
    body: Result<Json<RegisterSkillBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    if body.location.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "location must not be empty");
    }
    let record = SkillRecord::new(body.name, &body.version, body.location).map(|mut r| {
        r.permissions = body.permissions;
        r.metadata = body.metadata;
        r
    });
    match record.and_then(|r| state.skills.register(r)) {
        Ok(record) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "skill": dto::SkillDto::from(&record),
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn delete_skill(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.skills.remove(&name) {
        Ok(_) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Rescan the skills directory. Builtins and API-registered records stay.
pub async fn reload_skills(State(state): State<AppState>) -> Response {
    match state.skills.reload() {
        Ok(loaded) => Json(serde_json::json!({
            "success": true,
            "loaded": loaded,
            "total": state.skills.list().len(),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /skills/execute?session_id=…
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ExecuteQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    #[serde(default)]
    pub skill: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

/// A skill that ran and failed, or a runtime that could not run it, is
/// reported with HTTP 200 and `success: false`.
pub async fn execute_skill(
    State(state): State<AppState>,
    Query(query): Query<ExecuteQuery>,
    body: Result<Json<ExecuteBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let Some(session_id) = query.session_id.filter(|s| !s.trim().is_empty()) else {
        return api_error(StatusCode::BAD_REQUEST, "session_id query parameter is required");
    };
    if body.skill.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "skill is required");
    }
    let session_id = match SessionId::new(session_id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let cancel = state.request_token();
    match state
        .dispatcher
        .execute(&session_id, &body.skill, &body.input, &cancel)
        .await
    {
        Ok(out) => {
            let mut resp = serde_json::json!({
                "success": out.result.success,
                "output": out.result.output,
                "task_id": out.task.id().to_string(),
            });
            if !out.result.error.is_empty() {
                resp["error"] = Value::String(out.result.error);
            }
            Json(resp).into_response()
        }
        Err(e @ Error::SkillRuntime(_)) => {
            tracing::warn!(session_id = %session_id, skill = %body.skill, error = %e, "skill runtime failure");
            Json(serde_json::json!({
                "success": false,
                "output": "",
                "error": e.to_string(),
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}
