use serde::Serialize;

/// Structured trace events emitted across all ConvoAgent crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    UserResolved {
        user_id: String,
        channel: String,
        created: bool,
    },
    SessionOpened {
        session_id: String,
        user_id: String,
    },
    MessageAppended {
        session_id: String,
        message_id: String,
        role: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        messages: usize,
        duration_ms: u64,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
    },
    TaskTransition {
        task_id: String,
        session_id: String,
        skill: String,
        from: String,
        to: String,
    },
    ScheduleChanged {
        schedule_id: String,
        action: String,
    },
    StoreFlushed {
        path: String,
        bytes: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ca_event");
    }
}
