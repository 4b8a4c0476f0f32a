use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::UserId;
use crate::value::Channel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub channel: Channel,
    /// Channel-local identifier (chat id, account id, ...).
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(channel: Channel, channel_id: impl Into<String>) -> Result<Self> {
        let channel_id = channel_id.into();
        if channel_id.trim().is_empty() {
            return Err(Error::validation("channel_id must not be empty"));
        }
        Ok(Self {
            id: UserId::generate(),
            channel,
            channel_id,
            created_at: crate::time::now(),
        })
    }

    /// Uniqueness key of the `(channel, channel_id)` index.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.channel, self.channel_id)
    }
}
