//! ScheduleStore: schedule records persisted to `schedules.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use ca_domain::error::{Error, Result};
use ca_domain::ids::ScheduleId;
use ca_domain::model::{Schedule, SchedulePatch};
use ca_domain::trace::TraceEvent;

const SCHEDULES_FILE: &str = "schedules.json";

pub struct ScheduleStore {
    inner: RwLock<HashMap<ScheduleId, Schedule>>,
    persist_path: Option<PathBuf>,
    /// Held from snapshot to rename so disk writes land in order.
    persist_lock: tokio::sync::Mutex<()>,
}

impl ScheduleStore {
    /// Volatile store; nothing touches the disk.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            persist_path: None,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load `state_path/schedules.json` if present. An unreadable file is a
    /// startup error rather than a silently empty registry.
    pub fn open(state_path: &Path) -> Result<Self> {
        let persist_path = state_path.join(SCHEDULES_FILE);
        let mut map = HashMap::new();
        if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)?;
            let schedules: Vec<Schedule> = serde_json::from_str(&data).map_err(|e| {
                Error::Repository(format!("corrupt {}: {e}", persist_path.display()))
            })?;
            for s in schedules {
                map.insert(s.id.clone(), s);
            }
            tracing::info!(count = map.len(), "loaded schedules from disk");
        }
        Ok(Self {
            inner: RwLock::new(map),
            persist_path: Some(persist_path),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn persist(&self) {
        let Some(path) = self.persist_path.clone() else {
            return;
        };
        let _guard = self.persist_lock.lock().await;
        let json = {
            let map = self.inner.read();
            let mut schedules: Vec<&Schedule> = map.values().collect();
            schedules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            serde_json::to_string_pretty(&schedules)
        };
        let json = match json {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize schedules");
                return;
            }
        };
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, json)?;
            std::fs::rename(&tmp, &path)
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to persist schedules"),
            Err(e) => tracing::warn!(error = %e, "schedule persist task panicked"),
        }
    }

    /// All schedules, oldest first.
    pub fn list(&self) -> Vec<Schedule> {
        let mut out: Vec<Schedule> = self.inner.read().values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn get(&self, id: &ScheduleId) -> Result<Schedule> {
        self.inner
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("schedule", id.as_str()))
    }

    pub async fn insert(&self, schedule: Schedule) -> Result<Schedule> {
        {
            let mut map = self.inner.write();
            if map.contains_key(&schedule.id) {
                return Err(Error::Duplicate {
                    entity: "schedule",
                    key: schedule.id.to_string(),
                });
            }
            map.insert(schedule.id.clone(), schedule.clone());
        }
        self.persist().await;
        trace_change(&schedule.id, "created");
        Ok(schedule)
    }

    /// Apply `patch`; the stored schedule is unchanged when it is rejected.
    pub async fn update(&self, id: &ScheduleId, patch: SchedulePatch) -> Result<Schedule> {
        let updated = {
            let mut map = self.inner.write();
            let schedule = map
                .get_mut(id)
                .ok_or_else(|| Error::not_found("schedule", id.as_str()))?;
            schedule.apply(patch)?;
            schedule.clone()
        };
        self.persist().await;
        trace_change(id, "updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: &ScheduleId) -> Result<()> {
        if self.inner.write().remove(id).is_none() {
            return Err(Error::not_found("schedule", id.as_str()));
        }
        self.persist().await;
        trace_change(id, "deleted");
        Ok(())
    }
}

fn trace_change(id: &ScheduleId, action: &str) {
    TraceEvent::ScheduleChanged {
        schedule_id: id.to_string(),
        action: action.to_owned(),
    }
    .emit();
}
