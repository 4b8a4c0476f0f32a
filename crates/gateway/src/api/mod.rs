pub mod chat;
pub mod dto;
pub mod health;
pub mod schedules;
pub mod sessions;
pub mod skills;
pub mod users;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use ca_domain::error::{Error, ErrorKind};

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // Chat pipeline
        .route("/chat/send", post(chat::send))
        // Sessions
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/:id/messages", get(sessions::get_messages))
        .route("/sessions/:id/tasks", get(sessions::get_tasks))
        // Users
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/sessions", get(users::get_user_sessions))
        // Skills
        .route("/skills", get(skills::list_skills).post(skills::register_skill))
        .route("/skills/execute", post(skills::execute_skill))
        .route("/skills/reload", post(skills::reload_skills))
        .route(
            "/skills/:name",
            get(skills::get_skill).delete(skills::delete_skill),
        )
        // Schedules (records only)
        .route(
            "/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route(
            "/schedules/:id",
            get(schedules::get_schedule)
                .put(schedules::update_schedule)
                .delete(schedules::delete_schedule),
        )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Repository
        | ErrorKind::Provider
        | ErrorKind::SkillRuntime
        | ErrorKind::Canceled
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a domain error to its HTTP response. The full error is logged; only
/// the public message crosses the boundary.
pub(crate) fn error_response(err: &Error) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "request failed");
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "request rejected");
    }
    api_error(status, err.public_message())
}

/// Malformed or mistyped JSON bodies are a plain 400.
pub(crate) fn bad_body(rejection: JsonRejection) -> Response {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("invalid request body: {}", rejection.body_text()),
    )
}
