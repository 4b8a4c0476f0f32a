use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::SkillId;

/// Skill names: 1-64 chars of `[A-Za-z0-9._-]`, e.g. `echo`, `time.now`.
pub fn validate_skill_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("skill name must not be empty"));
    }
    if name.len() > 64
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(Error::validation(format!("invalid skill name: {name:?}")));
    }
    Ok(())
}

/// Registry record of an installed skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub id: SkillId,
    pub name: String,
    pub version: semver::Version,
    /// Opaque install location (directory path, `builtin:<name>`, ...).
    pub location: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SkillRecord {
    pub fn new(name: impl Into<String>, version: &str, location: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_skill_name(&name)?;
        let version = semver::Version::parse(version.trim())
            .map_err(|e| Error::validation(format!("invalid skill version {version:?}: {e}")))?;
        Ok(Self {
            id: SkillId::generate(),
            name,
            version,
            location: location.into(),
            permissions: Vec::new(),
            metadata: serde_json::Map::new(),
            created_at: crate::time::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(validate_skill_name("time.now").is_ok());
        assert!(validate_skill_name("web-fetch_2").is_ok());
        assert!(validate_skill_name("").is_err());
        assert!(validate_skill_name("rm -rf").is_err());
        assert!(validate_skill_name("../etc").is_err());
    }

    #[test]
    fn version_must_be_semver() {
        assert!(SkillRecord::new("echo", "1.0.0", "builtin:echo").is_ok());
        assert!(SkillRecord::new("echo", "1.0", "builtin:echo").is_err());
        assert!(SkillRecord::new("echo", "latest", "builtin:echo").is_err());
    }
}
