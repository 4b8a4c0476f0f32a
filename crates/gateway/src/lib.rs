//! ConvoAgent gateway: the conversation pipeline, task dispatcher and
//! schedule registry behind an axum HTTP API and a small CLI.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
