//! `convoagent run`: one turn through the pipeline from the command line.
//!
//! Useful for scripting, piping, and smoke-testing a provider config.

use std::sync::Arc;

use ca_domain::config::Config;

use crate::api::dto;
use crate::bootstrap;
use crate::runtime::SendRequest;

/// Run a single turn and print the reply (or the full outcome as JSON).
pub async fn run(
    config: Arc<Config>,
    message: String,
    user: String,
    channel: Option<String>,
    model: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    // 1. Boot the runtime (no background tasks).
    let state = bootstrap::build_app_state(config).await?;

    // 2. Run the turn.
    let req = SendRequest {
        user_id: user,
        channel,
        role: None,
        content: message,
        model,
        max_tokens: None,
    };
    let cancel = state.request_token();
    let result = state.orchestrator.send(req, &cancel).await;

    // 3. Persist whatever the turn wrote, even on failure.
    bootstrap::flush_store(&state).await;

    let out = result.map_err(|e| anyhow::anyhow!("{e}"))?;
    if json_output {
        let json = serde_json::json!({
            "session": dto::SessionDto::from(&out.session),
            "message": dto::MessageDto::from(&out.message),
            "messages": dto::messages(&out.messages),
            "usage": out.usage,
            "model": out.model,
        });
        let pretty = serde_json::to_string_pretty(&json)
            .map_err(|e| anyhow::anyhow!("serializing outcome: {e}"))?;
        println!("{pretty}");
    } else {
        println!("{}", out.message.content());
    }
    Ok(())
}
