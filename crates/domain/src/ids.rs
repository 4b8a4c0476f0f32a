//! Validated entity identifiers.
//!
//! Ids are opaque strings: any non-blank value without control characters
//! is accepted, so ids minted by other systems survive a round trip.
//! Locally generated ids are UUIDv7, which sort by creation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_ID_LEN: usize = 128;

fn check_id(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{label} must not be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(Error::validation(format!(
            "{label} must be at most {MAX_ID_LEN} bytes"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::validation(format!(
            "{label} must not contain control characters"
        )));
    }
    Ok(())
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                check_id($label, &value)?;
                Ok(Self(value))
            }

            /// Mint a fresh, time-ordered id.
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

define_id!(UserId, "user id");
define_id!(SessionId, "session id");
define_id!(MessageId, "message id");
define_id!(TaskId, "task id");
define_id!(ScheduleId, "schedule id");
define_id!(
    /// Registry id of a skill record (not the skill's name).
    SkillId,
    "skill id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_foreign_ids() {
        let id = SessionId::new("s1").unwrap();
        assert_eq!(id.as_str(), "s1");
        assert_eq!(id.to_string(), "s1");
    }

    #[test]
    fn rejects_blank_and_control_chars() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new("a\nb").is_err());
        assert!(UserId::new("x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn serde_rejects_invalid() {
        let ok: TaskId = serde_json::from_str("\"t-1\"").unwrap();
        assert_eq!(ok.as_str(), "t-1");
        assert!(serde_json::from_str::<TaskId>("\"\"").is_err());
    }
}
