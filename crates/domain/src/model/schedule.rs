use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cron::{parse_timezone, CronExpression};
use crate::error::Result;
use crate::ids::ScheduleId;

/// A cron-triggered binding of a skill to an input. Stored only; nothing
/// in-process fires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub skill: String,
    pub cron_expression: CronExpression,
    /// Serialized input handed to the skill.
    pub input: String,
    /// IANA timezone the cron fields are evaluated in.
    #[serde(default = "d_timezone")]
    pub timezone: String,
    #[serde(default = "d_true")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct SchedulePatch {
    pub skill: Option<String>,
    pub cron_expression: Option<CronExpression>,
    pub input: Option<String>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
}

impl Schedule {
    pub fn new(
        skill: impl Into<String>,
        cron_expression: CronExpression,
        input: impl Into<String>,
        timezone: Option<String>,
    ) -> Result<Self> {
        let skill = skill.into();
        super::validate_skill_name(&skill)?;
        let timezone = timezone.unwrap_or_else(d_timezone);
        parse_timezone(&timezone)?;
        let now = crate::time::now();
        Ok(Self {
            id: ScheduleId::generate(),
            skill,
            cron_expression,
            input: input.into(),
            timezone,
            enabled: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a patch atomically: on error nothing changes.
    pub fn apply(&mut self, patch: SchedulePatch) -> Result<()> {
        if let Some(skill) = &patch.skill {
            super::validate_skill_name(skill)?;
        }
        if let Some(tz) = &patch.timezone {
            parse_timezone(tz)?;
        }
        if let Some(skill) = patch.skill {
            self.skill = skill;
        }
        if let Some(cron) = patch.cron_expression {
            self.cron_expression = cron;
        }
        if let Some(input) = patch.input {
            self.input = input;
        }
        if let Some(tz) = patch.timezone {
            self.timezone = tz;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        self.updated_at = crate::time::now().max(self.created_at);
        Ok(())
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        parse_timezone(&self.timezone).unwrap_or(chrono_tz::UTC)
    }

    /// Upcoming fire times, empty when disabled.
    pub fn upcoming(&self, after: &DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        if !self.enabled {
            return Vec::new();
        }
        self.cron_expression.next_n(after, n, self.tz())
    }
}

fn d_timezone() -> String {
    "UTC".into()
}

fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cron(s: &str) -> CronExpression {
        CronExpression::parse(s).unwrap()
    }

    #[test]
    fn defaults_enabled_utc() {
        let s = Schedule::new("echo", cron("0 * * * *"), "{}", None).unwrap();
        assert!(s.enabled);
        assert_eq!(s.timezone, "UTC");
    }

    #[test]
    fn rejects_bad_timezone() {
        assert!(Schedule::new("echo", cron("0 * * * *"), "{}", Some("Mars/Base".into())).is_err());
    }

    #[test]
    fn failed_patch_changes_nothing() {
        let mut s = Schedule::new("echo", cron("0 * * * *"), "{}", None).unwrap();
        let before = s.clone();
        let res = s.apply(SchedulePatch {
            enabled: Some(false),
            timezone: Some("Nope/Nope".into()),
            ..Default::default()
        });
        assert!(res.is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn disabled_has_no_upcoming_runs() {
        let mut s = Schedule::new("echo", cron("*/5 * * * *"), "{}", None).unwrap();
        let now = crate::time::now();
        assert_eq!(s.upcoming(&now, 3).len(), 3);
        s.apply(SchedulePatch {
            enabled: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert!(s.upcoming(&now, 3).is_empty());
    }
}
