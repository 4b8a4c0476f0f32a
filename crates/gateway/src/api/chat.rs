//! `POST /chat/send`: one turn through the conversation pipeline.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::{bad_body, dto, error_response};
use crate::runtime::SendRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendBody {
    #[serde(default)]
    pub user_id: String,
    /// Defaults to `identity.default_channel`.
    #[serde(default)]
    pub channel: Option<String>,
    pub message: MessageBody,
    #[serde(default)]
    pub options: SendOptions,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendOptions {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

pub async fn send(
    State(state): State<AppState>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };

    let req = SendRequest {
        user_id: body.user_id,
        channel: body.channel,
        role: body.message.role,
        content: body.message.content,
        model: body.options.model,
        max_tokens: body.options.max_tokens,
    };

    let cancel = state.request_token();
    match state.orchestrator.send(req, &cancel).await {
        Ok(out) => Json(serde_json::json!({
            "success": true,
            "message": dto::MessageDto::from(&out.message),
            "messages": dto::messages(&out.messages),
            "session": dto::SessionDto::from(&out.session),
            "usage": out.usage,
            "model": out.model,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
