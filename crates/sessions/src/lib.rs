//! Conversation persistence for ConvoAgent.
//!
//! Repository traits describe what the orchestrator needs from storage;
//! `ConversationStore` is the in-process implementation backing all four,
//! with an optional JSON snapshot on disk.

pub mod repository;
pub mod store;

pub use repository::{
    MessageRepository, Repositories, SessionRepository, TaskRepository, UserRepository,
};
pub use store::{ConversationStore, StoreStats};
