//! Row types returned by the store. Distinct from the wire types in
//! skill-types to keep the storage layer independent of the platform.

use chrono::{DateTime, Utc};

/// Inbox entry without the message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: i64,
    /// Username of the sender, resolved through the users table.
    pub sender: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: i64,
    pub sender: String,
    pub payload: String,
    pub sent_at: DateTime<Utc>,
}

/// A message to persist. Sender and recipient are user ids.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: String,
    pub recipient: String,
    pub payload: String,
    pub sent_at: DateTime<Utc>,
}

impl NewMessage {
    /// Message stamped with the current time.
    pub fn now(sender: impl Into<String>, recipient: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            payload: payload.into(),
            sent_at: Utc::now(),
        }
    }
}
