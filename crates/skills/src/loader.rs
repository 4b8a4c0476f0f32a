use std::path::Path;

use serde::Deserialize;

use ca_domain::error::{Error, Result};
use ca_domain::model::SkillRecord;

/// Contents of `<skills_root>/<dir>/skill.toml`.
///
/// ```toml
/// name = "weather"
/// version = "0.2.0"
/// description = "Current conditions for a city"
/// permissions = ["net"]
///
/// [metadata]
/// author = "ops"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SkillManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SkillManifest {
    /// Registry record for a manifest found at `location`.
    pub fn into_record(self, location: &Path) -> Result<SkillRecord> {
        let mut record = SkillRecord::new(self.name, &self.version, location.display().to_string())?;
        record.permissions = self.permissions;
        record.metadata = self.metadata;
        if !self.description.is_empty() {
            record
                .metadata
                .entry("description")
                .or_insert_with(|| serde_json::Value::String(self.description));
        }
        Ok(record)
    }
}

/// Load a `skill.toml` from a skill directory.
pub fn load_manifest(skill_dir: &Path) -> Result<SkillManifest> {
    let toml_path = skill_dir.join("skill.toml");
    let content = std::fs::read_to_string(&toml_path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", toml_path.display())))
}

/// Scan the skills root and build a record for every valid manifest.
/// Invalid directories are logged and skipped; a missing root is empty.
pub fn scan_skills(skills_root: &Path) -> Result<Vec<SkillRecord>> {
    let mut records = Vec::new();
    if !skills_root.exists() {
        return Ok(records);
    }
    for entry in std::fs::read_dir(skills_root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        match load_manifest(&path).and_then(|m| m.into_record(&path)) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    skill_dir = %path.display(),
                    error = %e,
                    "skipping skill directory with invalid skill.toml"
                );
            }
        }
    }
    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}
