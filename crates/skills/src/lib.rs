//! Skills: the registry of installed skill records, `skill.toml` manifest
//! loading, and the runtime that executes skills by name.

pub mod builtins;
pub mod loader;
pub mod registry;
pub mod runtime;

pub use loader::SkillManifest;
pub use registry::SkillsRegistry;
pub use runtime::{ExecutionResult, LocalRuntime, SkillHandler, SkillRuntime};
