// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Parley gateway.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a running conversation.
///
/// Allocated from a process-wide monotonic counter so ids double as a
/// creation-order key. Never derived from wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub u64);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter plugged into the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    Channel,
    CredentialStore,
    Nlu,
}

/// Conversation scoping mode: one manager instance exists per mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScopeMode {
    /// Identity is `<user_id>&<room_id>` -- each user in each room gets its own stack.
    #[default]
    User,
    /// Identity is `<room_id>` -- the whole room shares one conversation stack.
    Room,
}

/// The scoping identity a conversation belongs to.
///
/// All ownership checks in the conversation manager compare identities, not
/// user ids: cross-identity access to a conversation is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    /// Compute the scoping identity for a message under the given mode.
    ///
    /// Room-id normalization (stripping transport prefixes) is the platform
    /// adapter's responsibility and has already happened by this point.
    pub fn scoped(mode: ScopeMode, user_id: &str, room_id: &str) -> Self {
        match mode {
            ScopeMode::User => Identity(format!("{user_id}&{room_id}")),
            ScopeMode::Room => Identity(room_id.to_string()),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized inbound message delivered by a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform-assigned or synthesized message id.
    pub id: String,
    /// Name of the source channel ("slack", "teams", "mattermost", "wechat").
    pub channel: String,
    /// Platform user id of the sender.
    pub user_id: String,
    /// Normalized room id (transport prefixes already stripped).
    pub room_id: String,
    /// Raw message text.
    pub text: String,
    /// Pre-extracted NLU parse, if an NLU adapter ran upstream.
    #[serde(default)]
    pub nlu: Option<NluResult>,
    /// RFC 3339 receipt timestamp.
    pub timestamp: String,
}

/// An outbound message to be sent through a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target channel name (routes the message back through the multiplexer).
    pub channel: String,
    /// Target room id.
    pub room_id: String,
    /// Message text.
    pub text: String,
    /// Interactive actions (buttons/selects); empty for plain text.
    #[serde(default)]
    pub actions: Vec<MessageAction>,
    /// Message id this is a reply to, when the platform supports threading.
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Build a plain-text reply addressed to the room an inbound message came from.
    pub fn reply_to(msg: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            channel: msg.channel.clone(),
            room_id: msg.room_id.clone(),
            text: text.into(),
            actions: Vec::new(),
            reply_to: Some(msg.id.clone()),
        }
    }
}

/// Kind of interactive action attached to an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Button,
    Select,
}

/// Platform-agnostic interactive action model.
///
/// The interactive-message renderer (a platform adapter concern) turns this
/// into buttons or dropdown entries; the gateway treats the rendered payload
/// as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAction {
    /// Display label.
    pub name: String,
    /// Rendering hint.
    pub kind: ActionKind,
    /// Value delivered back when the action is taken.
    pub value: String,
}

/// Cached credentials for one (integration, identity) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Opaque secret supplied by the login-completion callback.
    pub token: String,
    /// Last time these credentials were used; validity is `now - last_access <= ttl`.
    pub last_access: chrono::DateTime<chrono::Utc>,
}

impl Credentials {
    /// Create credentials with `last_access` set to now.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            last_access: chrono::Utc::now(),
        }
    }

    /// Whether the credentials are still within their TTL at `now`.
    pub fn is_valid_at(&self, ttl: std::time::Duration, now: chrono::DateTime<chrono::Utc>) -> bool {
        let age = now - self.last_access;
        age <= chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// One extracted NLU slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluEntity {
    /// Entity (slot) name.
    pub entity: String,
    /// Extracted value.
    pub value: serde_json::Value,
}

/// Result of an NLU parse over a raw utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluResult {
    /// Matched intent name.
    pub intent: String,
    /// Similarity score in [0, 1]; below the configured threshold means "no match".
    pub confidence: f64,
    /// Extracted slot values.
    #[serde(default)]
    pub entities: Vec<NluEntity>,
}
