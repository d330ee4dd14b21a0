//! Wire types exchanged with the voice platform.
//!
//! Inbound bodies are decoded leniently: every field has a default so that
//! partial requests (no session, no timezone) still decode. Whether the
//! request is acceptable is decided by the webhook, not by serde.

use serde::{Deserialize, Serialize};

/// The only request type the skill answers.
pub const TYPE_SIMPLE_UTTERANCE: &str = "SimpleUtterance";

/// Protocol version stamped on every response.
pub const PROTOCOL_VERSION: &str = "1.0";

// -- Request --

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub request: Utterance,
    #[serde(default)]
    pub session: Session,
    /// IANA zone name of the device, e.g. `Europe/Moscow`.
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub version: String,
}

impl WebhookRequest {
    pub fn user_id(&self) -> &str {
        &self.session.user.user_id
    }
}

/// A single voice/text command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Utterance {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    /// Set on the first request of a conversation.
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub user: SessionUser,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub user_id: String,
}

// -- Response --

#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub response: ResponsePayload,
    pub version: String,
}

/// Text the platform speaks back to the user.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsePayload {
    pub text: String,
}

impl WebhookResponse {
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            response: ResponsePayload { text: text.into() },
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}
