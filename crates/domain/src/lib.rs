//! Core types shared by every ConvoAgent crate: validated values, entities,
//! the error taxonomy, cancellation, LLM message types and configuration.

pub mod cancel;
pub mod config;
pub mod cron;
pub mod error;
pub mod ids;
pub mod model;
pub mod stream;
pub mod time;
pub mod tool;
pub mod trace;
pub mod value;

pub use error::{Error, ErrorKind, Result};
