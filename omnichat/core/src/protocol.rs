//! Wire protocol: inbound frame classification and outbound frames
//!
//! Inbound frames are JSON text. The decoder never fails the session; a
//! frame it cannot classify comes back as a [`DecodeError`] and the caller
//! drops it with a warning.
//!
//! | Frame                                   | Event                      |
//! |-----------------------------------------|----------------------------|
//! | `{type:"ping"}`                         | [`InboundEvent::Heartbeat`] |
//! | `{type:"typing"\|"stop_typing", ...}`   | [`InboundEvent::Typing`]    |
//! | `{type:"snapshot", data}`               | [`InboundEvent::Snapshot`]  |
//! | `{type:"update", data}`                 | [`InboundEvent::Update`]    |
//! | `{user_id, channel, ...}` (no `type`)   | [`InboundEvent::Update`]    |
//! | `{type:"message", ...}` / `{sender, text, ts}` | [`InboundEvent::Message`] |

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::model::{ChatMessage, ConversationKey, ConversationRecord};

/// Channel the embeddable widget talks on.
pub const WIDGET_CHANNEL: &str = "webchat";

/// What a socket was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionScope {
    /// Staff dashboard: sees every conversation
    Admin,
    /// A single visitor's conversation (widget, visitor app)
    Conversation(ConversationKey),
}

impl ConnectionScope {
    /// Scope used by the web widget for a visitor
    pub fn widget(participant_id: impl Into<String>) -> Self {
        Self::Conversation(ConversationKey::new(participant_id, WIDGET_CHANNEL))
    }

    /// Key of a conversation-scoped socket
    #[must_use]
    pub fn conversation_key(&self) -> Option<&ConversationKey> {
        match self {
            Self::Admin => None,
            Self::Conversation(key) => Some(key),
        }
    }
}

/// Typing signal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// Someone started or kept typing
    Typing,
    /// Someone stopped typing
    StopTyping,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Server ping; answered internally, never surfaced to listeners
    Heartbeat,
    /// Typing indicator input
    Typing {
        /// Conversation the signal belongs to
        key: ConversationKey,
        /// Start or stop
        signal: TypingSignal,
        /// Raw sender role, if sent
        sender: Option<String>,
    },
    /// Full replacement for one conversation
    Snapshot(ConversationRecord),
    /// Incremental record to merge
    Update(ConversationRecord),
    /// Plain chat line
    Message {
        /// Conversation the message belongs to
        key: ConversationKey,
        /// The message
        message: ChatMessage,
    },
}

impl InboundEvent {
    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Typing { .. } => "typing",
            Self::Snapshot(_) => "snapshot",
            Self::Update(_) => "update",
            Self::Message { .. } => "message",
        }
    }

    /// Conversation the event is about
    #[must_use]
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        match self {
            Self::Heartbeat => None,
            Self::Typing { key, .. } | Self::Message { key, .. } => Some(key.clone()),
            Self::Snapshot(record) | Self::Update(record) => Some(record.key()),
        }
    }
}

/// Classifies inbound frames for one socket scope.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    scope: ConnectionScope,
}

impl EventDecoder {
    /// Decoder for a socket opened with `scope`
    #[must_use]
    pub fn new(scope: ConnectionScope) -> Self {
        Self { scope }
    }

    /// Scope this decoder resolves implicit keys against
    #[must_use]
    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    /// Classify one text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for anything that is not one of the known
    /// frame shapes.
    pub fn decode(&self, text: &str) -> Result<InboundEvent, DecodeError> {
        let Value::Object(obj) = serde_json::from_str::<Value>(text)? else {
            return Err(DecodeError::NotAnObject);
        };

        match obj.get("type").cloned() {
            Some(Value::String(kind)) => self.decode_typed(&kind, obj),
            Some(_) => Err(DecodeError::Unrecognized),
            None if obj.contains_key("user_id") && obj.contains_key("channel") => {
                Ok(InboundEvent::Update(record_from(Value::Object(obj))?))
            }
            None if obj.contains_key("text") => self.message(obj),
            None => Err(DecodeError::Unrecognized),
        }
    }

    fn decode_typed(&self, kind: &str, obj: Map<String, Value>) -> Result<InboundEvent, DecodeError> {
        match kind {
            "ping" => Ok(InboundEvent::Heartbeat),
            "typing" | "stop_typing" => {
                let signal = if kind == "typing" {
                    TypingSignal::Typing
                } else {
                    TypingSignal::StopTyping
                };
                Ok(InboundEvent::Typing {
                    key: self.key_for(&obj)?,
                    signal,
                    sender: obj.get("sender").and_then(Value::as_str).map(str::to_owned),
                })
            }
            "snapshot" => Ok(InboundEvent::Snapshot(data_record(obj)?)),
            "update" => Ok(InboundEvent::Update(data_record(obj)?)),
            "message" => self.message(obj),
            other => Err(DecodeError::UnknownType(other.to_owned())),
        }
    }

    fn message(&self, obj: Map<String, Value>) -> Result<InboundEvent, DecodeError> {
        let key = self.key_for(&obj)?;
        if !obj.get("text").is_some_and(Value::is_string) {
            return Err(DecodeError::MissingField("text"));
        }
        let message: ChatMessage = serde_json::from_value(Value::Object(obj))?;
        Ok(InboundEvent::Message { key, message })
    }

    /// Explicit `user_id`/`channel` wins; otherwise the socket's own key.
    fn key_for(&self, obj: &Map<String, Value>) -> Result<ConversationKey, DecodeError> {
        let field = |name: &str| obj.get(name).and_then(Value::as_str);
        match (field("user_id"), field("channel"), self.scope.conversation_key()) {
            (Some(user), Some(channel), _) => Ok(ConversationKey::new(user, channel)),
            (Some(user), None, Some(own)) => Ok(ConversationKey::new(user, own.channel.clone())),
            (None, _, Some(own)) => Ok(own.clone()),
            _ => Err(DecodeError::MissingKey),
        }
    }
}

fn data_record(mut obj: Map<String, Value>) -> Result<ConversationRecord, DecodeError> {
    let data = obj.remove("data").ok_or(DecodeError::MissingField("data"))?;
    record_from(data)
}

fn record_from(value: Value) -> Result<ConversationRecord, DecodeError> {
    let Value::Object(obj) = &value else {
        return Err(DecodeError::NotAnObject);
    };
    if !obj.get("user_id").is_some_and(Value::is_string) {
        return Err(DecodeError::MissingField("user_id"));
    }
    if !obj.get("channel").is_some_and(Value::is_string) {
        return Err(DecodeError::MissingField("channel"));
    }
    Ok(serde_json::from_value(value)?)
}

// ============================================================================
// Outbound
// ============================================================================

/// Frames this client writes to the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Heartbeat reply
    Pong,
    /// Staff started typing in a conversation
    StaffTyping {
        /// Visitor id
        user_id: String,
        /// Channel
        channel: String,
    },
    /// Staff stopped typing
    StaffStopTyping {
        /// Visitor id
        user_id: String,
        /// Channel
        channel: String,
    },
}

impl OutboundFrame {
    /// `staff_typing` for `key`
    #[must_use]
    pub fn staff_typing(key: &ConversationKey) -> Self {
        Self::StaffTyping {
            user_id: key.participant_id.clone(),
            channel: key.channel.clone(),
        }
    }

    /// `staff_stop_typing` for `key`
    #[must_use]
    pub fn staff_stop_typing(key: &ConversationKey) -> Self {
        Self::StaffStopTyping {
            user_id: key.participant_id.clone(),
            channel: key.channel.clone(),
        }
    }

    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pong => "pong",
            Self::StaffTyping { .. } => "staff_typing",
            Self::StaffStopTyping { .. } => "staff_stop_typing",
        }
    }

    /// Serialize to the JSON text sent on the wire.
    ///
    /// # Errors
    ///
    /// Only fails if serde_json fails to serialize plain strings.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn admin() -> EventDecoder {
        EventDecoder::new(ConnectionScope::Admin)
    }

    fn widget() -> EventDecoder {
        EventDecoder::new(ConnectionScope::widget("visitor-1"))
    }

    #[test]
    fn test_ping_is_heartbeat() {
        assert_eq!(admin().decode(r#"{"type":"ping"}"#).unwrap(), InboundEvent::Heartbeat);
    }

    #[test]
    fn test_typing_on_widget_uses_socket_key() {
        let event = widget().decode(r#"{"type":"typing","sender":"staff"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Typing {
                key: ConversationKey::new("visitor-1", "webchat"),
                signal: TypingSignal::Typing,
                sender: Some("staff".into()),
            }
        );
    }

    #[test]
    fn test_typing_on_admin_needs_explicit_key() {
        let event = admin()
            .decode(r#"{"type":"stop_typing","user_id":"u1","channel":"sms"}"#)
            .unwrap();
        assert_eq!(event.conversation_key(), Some(ConversationKey::new("u1", "sms")));

        let err = admin().decode(r#"{"type":"typing"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingKey));
    }

    #[test]
    fn test_snapshot_and_typed_update() {
        let frame = json!({"type": "snapshot", "data": {"user_id": "u1", "channel": "web", "last_updated": "t1"}});
        let InboundEvent::Snapshot(record) = admin().decode(&frame.to_string()).unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(record.last_updated.as_deref(), Some("t1"));

        let frame = json!({"type": "update", "data": {"user_id": "u1", "channel": "web"}});
        assert_eq!(admin().decode(&frame.to_string()).unwrap().kind(), "update");
    }

    #[test]
    fn test_untyped_record_is_update() {
        let frame = json!({"user_id": "u1", "channel": "sms", "sender": "user", "text": "hi", "ts": "t"});
        let InboundEvent::Update(record) = admin().decode(&frame.to_string()).unwrap() else {
            panic!("expected update");
        };
        assert_eq!(record.inline_message().unwrap().text, "hi");
    }

    #[test]
    fn test_plain_message_on_conversation_socket() {
        let event = widget().decode(r#"{"sender":"bot","text":"Hello!","ts":"10:00"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Message {
                key: ConversationKey::new("visitor-1", "webchat"),
                message: ChatMessage::new("bot", "Hello!", "10:00"),
            }
        );
    }

    #[test]
    fn test_plain_message_on_admin_socket_is_rejected() {
        let err = admin().decode(r#"{"sender":"user","text":"hi","ts":"1"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingKey));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(admin().decode("not json").unwrap_err(), DecodeError::Json(_)));
        assert!(matches!(admin().decode("[1,2]").unwrap_err(), DecodeError::NotAnObject));
        assert!(matches!(
            admin().decode(r#"{"type":"dance"}"#).unwrap_err(),
            DecodeError::UnknownType(t) if t == "dance"
        ));
        assert!(matches!(
            admin().decode(r#"{"type":"snapshot"}"#).unwrap_err(),
            DecodeError::MissingField("data")
        ));
        assert!(matches!(
            admin().decode(r#"{"type":"update","data":{"channel":"web"}}"#).unwrap_err(),
            DecodeError::MissingField("user_id")
        ));
        assert!(matches!(
            admin().decode(r#"{"type":7}"#).unwrap_err(),
            DecodeError::Unrecognized
        ));
        assert!(matches!(admin().decode("{}").unwrap_err(), DecodeError::Unrecognized));
    }

    #[test]
    fn test_outbound_wire_format() {
        assert_eq!(OutboundFrame::Pong.to_json().unwrap(), r#"{"type":"pong"}"#);

        let key = ConversationKey::new("u1", "sms");
        let value: Value = serde_json::from_str(&OutboundFrame::staff_typing(&key).to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "staff_typing", "user_id": "u1", "channel": "sms"}));

        let value: Value =
            serde_json::from_str(&OutboundFrame::staff_stop_typing(&key).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "staff_stop_typing");
    }
}
