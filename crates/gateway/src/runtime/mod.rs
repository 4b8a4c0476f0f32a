//! Core runtime: the chat pipeline ([`orchestrator`]), skill task
//! dispatch ([`tasks`]) and the schedule registry ([`schedules`]).

pub mod orchestrator;
pub mod schedules;
pub mod tasks;

pub use orchestrator::{Orchestrator, SendOutcome, SendRequest};
pub use tasks::{TaskDispatcher, TaskOutcome};
