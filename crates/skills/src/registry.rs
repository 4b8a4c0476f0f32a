use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use ca_domain::error::{Error, Result};
use ca_domain::model::SkillRecord;

use crate::loader;

/// Location prefix of records that do not come from a manifest on disk.
pub const BUILTIN_LOCATION_PREFIX: &str = "builtin:";

/// In-memory registry of skill records, keyed by unique name.
pub struct SkillsRegistry {
    records: RwLock<BTreeMap<String, SkillRecord>>,
    skills_root: Option<PathBuf>,
}

impl SkillsRegistry {
    /// Registry seeded from the manifests under `skills_root`.
    pub fn load(skills_root: &Path) -> Result<Self> {
        let records = loader::scan_skills(skills_root)?;
        tracing::info!(skills_count = records.len(), root = %skills_root.display(), "skills registry loaded");
        Ok(Self {
            records: RwLock::new(records.into_iter().map(|r| (r.name.clone(), r)).collect()),
            skills_root: Some(skills_root.to_path_buf()),
        })
    }

    pub fn empty() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            skills_root: None,
        }
    }

    /// Insert a record; names are unique.
    pub fn register(&self, record: SkillRecord) -> Result<SkillRecord> {
        ca_domain::model::validate_skill_name(&record.name)?;
        let mut records = self.records.write();
        if records.contains_key(&record.name) {
            return Err(Error::Duplicate {
                entity: "skill",
                key: record.name,
            });
        }
        records.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    pub fn get(&self, name: &str) -> Option<SkillRecord> {
        self.records.read().get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<SkillRecord> {
        self.get(name).ok_or_else(|| Error::not_found("skill", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.read().contains_key(name)
    }

    /// All records, sorted by name.
    pub fn list(&self) -> Vec<SkillRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn remove(&self, name: &str) -> Result<SkillRecord> {
        self.records
            .write()
            .remove(name)
            .ok_or_else(|| Error::not_found("skill", name))
    }

    /// Re-scan the skills root. Builtin and API-registered records stay;
    /// manifest-backed records are replaced by what is on disk now.
    pub fn reload(&self) -> Result<usize> {
        let Some(root) = &self.skills_root else {
            return Ok(0);
        };
        let root_str = root.display().to_string();
        let scanned = loader::scan_skills(root)?;

        let mut records = self.records.write();
        records.retain(|_, r| !r.location.starts_with(&root_str));
        let mut loaded = 0;
        for record in scanned {
            if records.contains_key(&record.name) {
                tracing::warn!(skill = %record.name, "manifest shadows an existing skill; skipped");
                continue;
            }
            records.insert(record.name.clone(), record);
            loaded += 1;
        }
        tracing::info!(skills_count = loaded, "skills registry reloaded");
        Ok(loaded)
    }
}
