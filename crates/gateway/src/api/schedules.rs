//! Schedule CRUD. Schedules are records only; nothing fires them.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{Map, Value};

use ca_domain::ids::ScheduleId;
use ca_domain::time::format_rfc3339;

use super::{bad_body, dto, error_response};
use crate::runtime::schedules::{self, ScheduleDraft, ScheduleUpdate};
use crate::state::AppState;

/// Fire times listed by `GET /schedules/:id`.
const PREVIEW_COUNT: usize = 5;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /schedules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_schedules(State(state): State<AppState>) -> impl IntoResponse {
    let views: Vec<dto::ScheduleDto> = state
        .schedules
        .list()
        .iter()
        .map(dto::ScheduleDto::from)
        .collect();
    Json(serde_json::json!({
        "success": true,
        "count": views.len(),
        "schedules": views,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /schedules/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_schedule(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = ScheduleId::new(id).and_then(|id| state.schedules.get(&id));
    match result {
        Ok(schedule) => {
            let next: Vec<String> = schedule
                .upcoming(&ca_domain::time::now(), PREVIEW_COUNT)
                .iter()
                .map(format_rfc3339)
                .collect();
            Json(serde_json::json!({
                "success": true,
                "schedule": dto::ScheduleDto::from(&schedule),
                "next_occurrences": next,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /schedules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub skill: String,
    pub cron_expression: String,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create_schedule(
    State(state): State<AppState>,
    body: Result<Json<CreateScheduleRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let draft = ScheduleDraft {
        skill: req.skill,
        cron_expression: req.cron_expression,
        input: req.input,
        timezone: req.timezone,
        enabled: req.enabled,
    };
    match schedules::create(&state.schedules, state.runtime.as_ref(), draft).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "schedule": dto::ScheduleDto::from(&created),
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /schedules/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub skill: Option<String>,
    pub cron_expression: Option<String>,
    pub input: Option<Map<String, Value>>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateScheduleRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let id = match ScheduleId::new(id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let update = ScheduleUpdate {
        skill: req.skill,
        cron_expression: req.cron_expression,
        input: req.input,
        timezone: req.timezone,
        enabled: req.enabled,
    };
    match schedules::update(&state.schedules, state.runtime.as_ref(), &id, update).await {
        Ok(updated) => Json(serde_json::json!({
            "success": true,
            "schedule": dto::ScheduleDto::from(&updated),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /schedules/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_schedule(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match ScheduleId::new(id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    match state.schedules.delete(&id).await {
        Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => error_response(&e),
    }
}
