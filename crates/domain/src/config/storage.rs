use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `conversations.json` and `schedules.json`.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// When false everything lives in memory and is lost on exit.
    #[serde(default = "d_true")]
    pub persist: bool,
    /// Background snapshot interval; 0 flushes only at shutdown.
    #[serde(default = "d_flush_interval")]
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            persist: true,
            flush_interval_secs: d_flush_interval(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_true() -> bool {
    true
}
fn d_flush_interval() -> u64 {
    30
}
