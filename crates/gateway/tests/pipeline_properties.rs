//! Orchestrator and dispatcher properties against stubbed collaborators.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::{Map, Value};

use ca_domain::cancel::CancelToken;
use ca_domain::error::Error;
use ca_domain::time::{format_rfc3339, parse_rfc3339};
use ca_domain::value::{Channel, Role, TaskStatus};
use ca_gateway::runtime::SendRequest;
use ca_sessions::{ConversationStore, Repositories};
use ca_skills::ExecutionResult;

use common::*;

fn hello(user_id: &str) -> SendRequest {
    SendRequest {
        user_id: user_id.into(),
        role: Some("user".into()),
        content: "Hello".into(),
        model: Some("gpt-4".into()),
        max_tokens: Some(100),
        ..Default::default()
    }
}

// ── User identity ──────────────────────────────────────────────────

#[tokio::test]
async fn ensure_user_is_idempotent() {
    let store = Arc::new(ConversationStore::in_memory());
    let users = CountingUsers::new(store.clone());
    let mut repos = Repositories::from_store(store.clone());
    repos.users = users.clone();
    let state = state_with(store, repos, StubProvider::replying("Hi"), echo_runtime());

    let first = state.orchestrator.ensure_user(&Channel::Telegram, "777").await.unwrap();
    let second = state.orchestrator.ensure_user(&Channel::Telegram, "777").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(users.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_sends_reuse_the_user_but_not_the_session() {
    let state = simple_state(StubProvider::replying("Hi"), echo_runtime());
    let a = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();
    let b = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();

    assert_eq!(a.user.id, b.user.id);
    assert_ne!(a.session.id, b.session.id);
    assert_eq!(state.store.stats().users, 1);
    assert_eq!(state.store.stats().sessions, 2);
}

// ── Transcript ─────────────────────────────────────────────────────

#[tokio::test]
async fn transcript_ends_with_prompt_then_reply() {
    let provider = StubProvider::replying("Hi");
    let state = simple_state(provider.clone(), echo_runtime());

    let out = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();
    let transcript = state.orchestrator.get_conversation(&out.session.id).await.unwrap();

    let n = transcript.len();
    assert!(n >= 2);
    let (prompt, reply) = (&transcript[n - 2], &transcript[n - 1]);
    assert_eq!((prompt.role(), prompt.content()), (Role::User, "Hello"));
    assert_eq!((reply.role(), reply.content()), (Role::Assistant, "Hi"));
    assert!(prompt.created_at() <= reply.created_at());

    // The provider saw the prompt it answered, with the request options.
    let seen = provider.requests.lock();
    assert_eq!(seen[0].messages.last().map(|m| m.content.as_str()), Some("Hello"));
    assert_eq!(seen[0].model.as_deref(), Some("gpt-4"));
    assert_eq!(seen[0].max_tokens, Some(100));
}

#[tokio::test]
async fn outcome_matches_a_later_read() {
    let state = simple_state(StubProvider::replying("Hi"), echo_runtime());
    let out = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();
    let again = state.orchestrator.get_conversation(&out.session.id).await.unwrap();

    let ids: Vec<_> = out.messages.iter().map(|m| m.id().clone()).collect();
    let again_ids: Vec<_> = again.iter().map(|m| m.id().clone()).collect();
    assert_eq!(ids, again_ids);
    assert_eq!(out.usage.total_tokens, 15);
}

// ── Task lifecycle ─────────────────────────────────────────────────

async fn run_skill(runtime: Arc<StubRuntime>) -> (Result<ca_gateway::runtime::TaskOutcome, Error>, ca_domain::model::Task) {
    let state = simple_state(StubProvider::replying("Hi"), runtime);
    let out = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();
    let mut input = Map::new();
    input.insert("x".into(), Value::from(1));

    let result = state
        .dispatcher
        .execute(&out.session.id, "echo", &input, &CancelToken::new())
        .await;
    let tasks = state.orchestrator.get_session_tasks(&out.session.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    (result, tasks[0].clone())
}

#[tokio::test]
async fn successful_skill_completes_with_output() {
    let (result, task) = run_skill(echo_runtime()).await;
    let out = result.unwrap();
    assert!(out.result.success);
    assert_eq!(task.status(), TaskStatus::Completed);
    assert_eq!(task.output(), r#"{"x":1}"#);
    assert!(task.error().is_empty());
    assert_eq!(task.input(), r#"{"x":1}"#);
}

#[tokio::test]
async fn reported_failure_fails_with_error() {
    let (result, task) = run_skill(StubRuntime::returning(ExecutionResult::failed("quota exceeded"))).await;
    let out = result.unwrap();
    assert!(!out.result.success);
    assert_eq!(task.status(), TaskStatus::Failed);
    assert!(task.output().is_empty());
    assert_eq!(task.error(), "quota exceeded");
}

#[tokio::test]
async fn empty_results_still_satisfy_the_lifecycle() {
    let (_, completed) = run_skill(StubRuntime::returning(ExecutionResult::ok(""))).await;
    assert_eq!(completed.status(), TaskStatus::Completed);
    assert!(!completed.output().is_empty());

    let (_, failed) = run_skill(StubRuntime::returning(ExecutionResult::failed(""))).await;
    assert_eq!(failed.status(), TaskStatus::Failed);
    assert!(!failed.error().is_empty());
}

#[tokio::test]
async fn runtime_transport_error_fails_the_task() {
    let (result, task) = run_skill(StubRuntime::broken("connection refused")).await;
    assert!(matches!(result, Err(Error::SkillRuntime(ref m)) if m.contains("connection refused")));
    assert_eq!(task.status(), TaskStatus::Failed);
    assert!(task.error().contains("connection refused"));
    assert!(task.output().is_empty());
}

async fn run_recorded(
    runtime: Arc<StubRuntime>,
    tasks: Arc<RecordingTasks>,
    store: Arc<ConversationStore>,
) -> (Result<ca_gateway::runtime::TaskOutcome, Error>, ca_domain::model::Task) {
    let mut repos = Repositories::from_store(store.clone());
    repos.tasks = tasks;
    let state = state_with(store, repos, StubProvider::replying("Hi"), runtime);
    let out = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();
    let mut input = Map::new();
    input.insert("x".into(), Value::from(1));

    let result = state
        .dispatcher
        .execute(&out.session.id, "echo", &input, &CancelToken::new())
        .await;
    let stored = state.orchestrator.get_session_tasks(&out.session.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    (result, stored[0].clone())
}

#[tokio::test]
async fn status_sequence_runs_then_completes() {
    let store = Arc::new(ConversationStore::in_memory());
    let tasks = RecordingTasks::new(store.clone());
    let (result, stored) = run_recorded(echo_runtime(), tasks.clone(), store).await;

    assert!(result.unwrap().result.success);
    assert_eq!(tasks.statuses(), vec![TaskStatus::Running, TaskStatus::Completed]);
    assert_eq!(stored.status(), TaskStatus::Completed);
}

#[tokio::test]
async fn status_sequence_runs_then_fails() {
    let store = Arc::new(ConversationStore::in_memory());
    let tasks = RecordingTasks::new(store.clone());
    let runtime = StubRuntime::returning(ExecutionResult::failed("quota exceeded"));
    run_recorded(runtime, tasks.clone(), store).await;
    assert_eq!(tasks.statuses(), vec![TaskStatus::Running, TaskStatus::Failed]);

    let store = Arc::new(ConversationStore::in_memory());
    let tasks = RecordingTasks::new(store.clone());
    run_recorded(StubRuntime::broken("connection refused"), tasks.clone(), store).await;
    assert_eq!(tasks.statuses(), vec![TaskStatus::Running, TaskStatus::Failed]);
}

#[tokio::test]
async fn status_write_failures_do_not_hide_the_result() {
    let store = Arc::new(ConversationStore::in_memory());
    let tasks = RecordingTasks::failing_updates(store.clone());
    let (result, stored) = run_recorded(echo_runtime(), tasks.clone(), store).await;

    let out = result.unwrap();
    assert!(out.result.success);
    assert_eq!(out.result.output, r#"{"x":1}"#);
    assert!(out.result.error.is_empty());
    assert_eq!(out.task.status(), TaskStatus::Completed);
    // Both writes were attempted and rejected; the stored row never left pending.
    assert_eq!(tasks.statuses(), vec![TaskStatus::Running, TaskStatus::Completed]);
    assert_eq!(stored.status(), TaskStatus::Pending);
}

#[tokio::test]
async fn reported_failure_survives_status_write_failures() {
    let store = Arc::new(ConversationStore::in_memory());
    let tasks = RecordingTasks::failing_updates(store.clone());
    let runtime = StubRuntime::returning(ExecutionResult::failed("quota exceeded"));
    let (result, _) = run_recorded(runtime, tasks, store).await;

    let out = result.unwrap();
    assert!(!out.result.success);
    assert_eq!(out.result.error, "quota exceeded");
    assert_eq!(out.task.status(), TaskStatus::Failed);
}

#[tokio::test]
async fn runtime_error_wins_over_status_write_failure() {
    let store = Arc::new(ConversationStore::in_memory());
    let tasks = RecordingTasks::failing_updates(store.clone());
    let (result, stored) = run_recorded(StubRuntime::broken("connection refused"), tasks, store).await;

    assert!(matches!(result, Err(Error::SkillRuntime(ref m)) if m.contains("connection refused")));
    assert_eq!(stored.status(), TaskStatus::Pending);
}

// ── Timestamps ─────────────────────────────────────────────────────

#[test]
fn rfc3339_round_trip_at_second_precision() {
    for raw in ["2024-02-29T23:59:59Z", "1999-12-31T00:00:00Z", "2030-06-15T12:30:45Z"] {
        let ts = parse_rfc3339(raw).unwrap();
        assert_eq!(format_rfc3339(&ts), raw);
        assert_eq!(parse_rfc3339(&format_rfc3339(&ts)).unwrap(), ts);
    }
    let offset = parse_rfc3339("2024-01-01T10:00:00+02:00").unwrap();
    assert_eq!(format_rfc3339(&offset), "2024-01-01T08:00:00Z");
}

// ── Non-fatal persistence ──────────────────────────────────────────

#[tokio::test]
async fn assistant_write_failure_is_not_fatal() {
    let store = Arc::new(ConversationStore::in_memory());
    let mut repos = Repositories::from_store(store.clone());
    repos.messages = AssistantWriteFails::new(store.clone());
    let state = state_with(store.clone(), repos, StubProvider::replying("Hi"), echo_runtime());

    let out = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();
    assert_eq!(out.message.content(), "Hi");
    assert_eq!(out.message.role(), Role::Assistant);
    assert_eq!(out.messages.len(), 1);
    assert_eq!(store.stats().messages, 1);
}

#[tokio::test]
async fn session_touch_failure_is_not_fatal() {
    let store = Arc::new(ConversationStore::in_memory());
    let mut repos = Repositories::from_store(store.clone());
    repos.sessions = TouchFails::new(store.clone());
    let state = state_with(store, repos, StubProvider::replying("Hi"), echo_runtime());

    let out = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap();
    assert_eq!(out.messages.len(), 2);
    assert_eq!(out.session.updated_at, out.session.created_at);
}

// ── Cancellation ───────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_before_send_writes_nothing() {
    let provider = StubProvider::replying("Hi");
    let state = simple_state(provider.clone(), echo_runtime());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = state.orchestrator.send(hello("u1"), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Canceled(_)));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(state.store.stats().messages, 0);
}

#[tokio::test]
async fn expired_deadline_stops_before_the_provider() {
    let provider = StubProvider::replying("Hi");
    let state = simple_state(provider.clone(), echo_runtime());
    let cancel = CancelToken::with_timeout(std::time::Duration::ZERO);

    let err = state.orchestrator.send(hello("u1"), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Canceled(_)));
    assert_eq!(provider.call_count(), 0);
    assert!(state.store.stats().messages <= 1);
}

#[tokio::test]
async fn provider_error_keeps_only_the_prompt() {
    let state = simple_state(StubProvider::failing("rate limited"), echo_runtime());
    let err = state.orchestrator.send(hello("u1"), &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Provider { ref message, .. } if message == "rate limited"));
    assert_eq!(state.store.stats().messages, 1);
}
