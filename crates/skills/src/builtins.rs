//! Skills that ship with the binary.

use std::sync::Arc;

use serde_json::{Map, Value};

use ca_domain::error::Result;

use crate::runtime::{ExecutionResult, SkillHandler};

pub fn all() -> Vec<Arc<dyn SkillHandler>> {
    vec![Arc::new(Echo), Arc::new(TimeNow)]
}

/// Returns its input as compact JSON.
pub struct Echo;

#[async_trait::async_trait]
impl SkillHandler for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Return the input object unchanged"
    }
    async fn call(&self, input: &Map<String, Value>) -> Result<ExecutionResult> {
        Ok(ExecutionResult::ok(serde_json::to_string(input)?))
    }
}

/// Current time, optionally in the IANA zone given as `timezone`.
pub struct TimeNow;

#[async_trait::async_trait]
impl SkillHandler for TimeNow {
    fn name(&self) -> &str {
        "time.now"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Current time in UTC or a given timezone"
    }
    async fn call(&self, input: &Map<String, Value>) -> Result<ExecutionResult> {
        let tz_name = input
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC");
        let tz = match ca_domain::cron::parse_timezone(tz_name) {
            Ok(tz) => tz,
            Err(e) => return Ok(ExecutionResult::failed(e.to_string())),
        };
        let now = ca_domain::time::now();
        let local = now.with_timezone(&tz);
        let out = serde_json::json!({
            "utc": ca_domain::time::format_rfc3339(&now),
            "local": local.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            "timezone": tz_name,
        });
        Ok(ExecutionResult::ok(out.to_string()))
    }
}
