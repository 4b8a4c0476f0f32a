//! Schedule registry: cron-bound skill invocations, stored only.
//!
//! Nothing in-process fires a schedule. The registry validates records
//! against the skill runtime and previews the next fire times.
//!
//! - [`store`]: persistent `ScheduleStore`

pub mod store;

pub use store::ScheduleStore;

use serde_json::{Map, Value};

use ca_domain::cron::CronExpression;
use ca_domain::error::{Error, Result};
use ca_domain::model::{Schedule, SchedulePatch};
use ca_skills::SkillRuntime;

/// Fields accepted when creating a schedule.
#[derive(Debug, Clone)]
pub struct ScheduleDraft {
    pub skill: String,
    pub cron_expression: String,
    pub input: Map<String, Value>,
    pub timezone: Option<String>,
    pub enabled: bool,
}

/// Fields accepted when updating a schedule; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub skill: Option<String>,
    pub cron_expression: Option<String>,
    pub input: Option<Map<String, Value>>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
}

/// Validate and store a new schedule.
pub async fn create(
    store: &ScheduleStore,
    runtime: &dyn SkillRuntime,
    draft: ScheduleDraft,
) -> Result<Schedule> {
    let cron = CronExpression::parse(&draft.cron_expression)?;
    ensure_skill(runtime, &draft.skill).await?;
    let input = serde_json::to_string(&draft.input)?;
    let mut schedule = Schedule::new(draft.skill, cron, input, draft.timezone)?;
    schedule.enabled = draft.enabled;
    store.insert(schedule).await
}

/// Validate and apply a partial update.
pub async fn update(
    store: &ScheduleStore,
    runtime: &dyn SkillRuntime,
    id: &ca_domain::ids::ScheduleId,
    update: ScheduleUpdate,
) -> Result<Schedule> {
    let cron_expression = update
        .cron_expression
        .as_deref()
        .map(CronExpression::parse)
        .transpose()?;
    if let Some(skill) = &update.skill {
        ensure_skill(runtime, skill).await?;
    }
    let input = update.input.as_ref().map(serde_json::to_string).transpose()?;
    let patch = SchedulePatch {
        skill: update.skill,
        cron_expression,
        input,
        timezone: update.timezone,
        enabled: update.enabled,
    };
    store.update(id, patch).await
}

/// A schedule may only name a skill the runtime can execute.
async fn ensure_skill(runtime: &dyn SkillRuntime, name: &str) -> Result<()> {
    runtime.validate(name).await.map_err(|e| match e {
        Error::NotFound { .. } => Error::validation(format!("unknown skill: {name}")),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ca_skills::{LocalRuntime, SkillsRegistry};

    fn runtime() -> LocalRuntime {
        LocalRuntime::with_builtins(Arc::new(SkillsRegistry::empty()))
    }

    fn draft(skill: &str, cron: &str) -> ScheduleDraft {
        ScheduleDraft {
            skill: skill.into(),
            cron_expression: cron.into(),
            input: Map::new(),
            timezone: Some("Europe/Paris".into()),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn create_checks_cron_and_skill() {
        let store = ScheduleStore::in_memory();
        let rt = runtime();

        let bad_cron = create(&store, &rt, draft("echo", "61 * * * *")).await;
        assert!(matches!(bad_cron, Err(Error::Validation(_))));

        let bad_skill = create(&store, &rt, draft("weather", "0 9 * * 1-5")).await;
        assert!(matches!(bad_skill, Err(Error::Validation(ref m)) if m.contains("weather")));

        let ok = create(&store, &rt, draft("echo", "0 9 * * 1-5")).await.unwrap();
        assert_eq!(ok.timezone, "Europe/Paris");
        assert_eq!(ok.input, "{}");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn update_reparses_cron() {
        let store = ScheduleStore::in_memory();
        let rt = runtime();
        let created = create(&store, &rt, draft("echo", "0 9 * * *")).await.unwrap();

        let updated = update(
            &store,
            &rt,
            &created.id,
            ScheduleUpdate {
                cron_expression: Some("30 18 * * 5".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.cron_expression.as_str(), "30 18 * * 5");

        let rejected = update(
            &store,
            &rt,
            &created.id,
            ScheduleUpdate {
                cron_expression: Some("every friday".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(rejected.is_err());
        assert_eq!(
            store.get(&created.id).unwrap().cron_expression.as_str(),
            "30 18 * * 5"
        );
    }
}
