//! Records exchanged with the chat server
//!
//! Conversations are identified by a composite [`ConversationKey`]; records
//! keep every server-enriched field they do not model in `extra` so that a
//! host can render fields this crate does not know about.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Keys
// ============================================================================

/// Identity of a conversation: one participant on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Visitor identifier (phone number, widget visitor id, ...)
    #[serde(rename = "user_id")]
    pub participant_id: String,
    /// Channel name (`webchat`, `sms`, `whatsapp`, ...)
    pub channel: String,
}

impl ConversationKey {
    /// Build a key from its parts
    pub fn new(participant_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.participant_id, self.channel)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Who authored a message or typing signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderRole {
    /// The visitor
    User,
    /// A human staff member
    Staff,
    /// Dashboard administrator
    Admin,
    /// Automated reply
    Bot,
    /// Server-generated notice
    System,
    /// Anything else the server sends
    Unknown,
}

impl SenderRole {
    /// Classify a raw sender string
    #[must_use]
    pub fn parse(sender: &str) -> Self {
        match sender.trim().to_ascii_lowercase().as_str() {
            "user" | "visitor" | "customer" => Self::User,
            "staff" | "agent" => Self::Staff,
            "admin" => Self::Admin,
            "bot" | "assistant" => Self::Bot,
            "system" => Self::System,
            _ => Self::Unknown,
        }
    }

    /// Sent by someone on the support side
    #[must_use]
    pub fn is_support(self) -> bool {
        matches!(self, Self::Staff | Self::Admin | Self::Bot)
    }
}

/// One chat line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Raw sender string as sent by the server
    #[serde(default)]
    pub sender: String,
    /// Message body
    pub text: String,
    /// Server timestamp, kept opaque
    #[serde(default)]
    pub ts: String,
}

impl ChatMessage {
    /// Build a message
    pub fn new(sender: impl Into<String>, text: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            ts: ts.into(),
        }
    }

    /// Parsed sender role
    #[must_use]
    pub fn role(&self) -> SenderRole {
        SenderRole::parse(&self.sender)
    }
}

// ============================================================================
// Conversations
// ============================================================================

/// A conversation as the server describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Visitor identifier
    #[serde(rename = "user_id")]
    pub participant_id: String,
    /// Channel name
    pub channel: String,
    /// Staff member the conversation is assigned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<String>,
    /// Last activity, opaque server timestamp
    #[serde(default, alias = "updated_at", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Full history when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    /// Message count when only the count is sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
    /// Every other server-enriched field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationRecord {
    /// Bare record for a key
    #[must_use]
    pub fn new(key: &ConversationKey) -> Self {
        Self {
            participant_id: key.participant_id.clone(),
            channel: key.channel.clone(),
            assigned_staff: None,
            last_updated: None,
            messages: None,
            message_count: None,
            extra: Map::new(),
        }
    }

    /// Set `last_updated`
    #[must_use]
    pub fn with_last_updated(mut self, ts: impl Into<String>) -> Self {
        self.last_updated = Some(ts.into());
        self
    }

    /// Composite key of this record
    #[must_use]
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.participant_id.clone(), self.channel.clone())
    }

    /// True if the record belongs to `key`
    #[must_use]
    pub fn has_key(&self, key: &ConversationKey) -> bool {
        self.participant_id == key.participant_id && self.channel == key.channel
    }

    /// Number of messages, from the list or the count field
    #[must_use]
    pub fn message_total(&self) -> u64 {
        match (&self.messages, self.message_count) {
            (Some(list), _) => list.len() as u64,
            (None, Some(count)) => count,
            (None, None) => 0,
        }
    }

    /// Most recent message in the history list
    #[must_use]
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.as_ref().and_then(|list| list.last())
    }

    /// Message carried inline on admin broadcasts
    /// (`{user_id, channel, sender, text, ts}`).
    #[must_use]
    pub fn inline_message(&self) -> Option<ChatMessage> {
        let text = self.extra.get("text")?.as_str()?;
        let field = |name: &str| {
            self.extra
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Some(ChatMessage::new(field("sender"), text, field("ts")))
    }
}

// ============================================================================
// Follow-ups
// ============================================================================

/// Server-assigned follow-up identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FollowupId(pub i64);

impl fmt::Display for FollowupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contact-form submission awaiting staff attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowupRecord {
    /// Unique id
    pub id: FollowupId,
    /// Contact name
    #[serde(default)]
    pub name: Option<String>,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Free-text message
    #[serde(default)]
    pub message: Option<String>,
    /// Submission time, opaque server timestamp
    #[serde(default, alias = "ts", alias = "created_at")]
    pub submitted_at: Option<String>,
    /// Server-side viewed flag (stored as 0/1 by the server)
    #[serde(default, deserialize_with = "bool_or_int")]
    pub viewed: bool,
    /// Every other field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FollowupRecord {
    /// Record with only an id
    #[must_use]
    pub fn new(id: FollowupId) -> Self {
        Self {
            id,
            name: None,
            email: None,
            phone: None,
            message: None,
            submitted_at: None,
            viewed: false,
            extra: Map::new(),
        }
    }
}

fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_i64().is_some_and(|v| v != 0)),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected bool or integer, got {other}"
        ))),
    }
}
