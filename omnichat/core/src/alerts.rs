//! Alert classification for hosts that raise notifications.
//!
//! Only decides *whether* to alert; delivery belongs to the host.

use crate::model::{ConversationKey, SenderRole};
use crate::protocol::InboundEvent;

/// Whether the host is currently showing the conversation UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostVisibility {
    /// App in the foreground: the live view already shows everything
    Foreground,
    /// App in the background
    Background,
}

/// Something worth telling staff about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// A visitor sent a message
    NewMessage {
        /// Conversation
        key: ConversationKey,
        /// Message text
        text: String,
    },
    /// A conversation appeared that has no visitor message to show
    NewConversation {
        /// Conversation
        key: ConversationKey,
    },
}

/// Decides which inbound events raise an alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertPolicy;

impl AlertPolicy {
    /// New policy
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Alert for `event`, if any.
    #[must_use]
    pub fn classify(&self, event: &InboundEvent, visibility: HostVisibility) -> Option<Alert> {
        if visibility == HostVisibility::Foreground {
            return None;
        }

        match event {
            InboundEvent::Message { key, message } if message.role() == SenderRole::User => {
                Some(Alert::NewMessage {
                    key: key.clone(),
                    text: message.text.clone(),
                })
            }
            InboundEvent::Update(record) => {
                let message = record
                    .inline_message()
                    .or_else(|| record.last_message().cloned())?;
                (message.role() == SenderRole::User).then(|| Alert::NewMessage {
                    key: record.key(),
                    text: message.text,
                })
            }
            InboundEvent::Snapshot(record) => match record.last_message() {
                Some(last) if last.role() == SenderRole::User => Some(Alert::NewMessage {
                    key: record.key(),
                    text: last.text.clone(),
                }),
                _ => Some(Alert::NewConversation { key: record.key() }),
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatMessage, ConversationRecord};
    use crate::protocol::TypingSignal;

    fn key() -> ConversationKey {
        ConversationKey::new("u1", "sms")
    }

    fn message(sender: &str) -> InboundEvent {
        InboundEvent::Message {
            key: key(),
            message: ChatMessage::new(sender, "hello", "1"),
        }
    }

    #[test]
    fn test_foreground_never_alerts() {
        let policy = AlertPolicy::new();
        assert_eq!(policy.classify(&message("user"), HostVisibility::Foreground), None);
    }

    #[test]
    fn test_user_message_alerts_in_background() {
        let policy = AlertPolicy::new();
        assert_eq!(
            policy.classify(&message("user"), HostVisibility::Background),
            Some(Alert::NewMessage { key: key(), text: "hello".into() })
        );
        assert_eq!(policy.classify(&message("staff"), HostVisibility::Background), None);
    }

    #[test]
    fn test_snapshot_without_user_message_is_new_conversation() {
        let policy = AlertPolicy::new();
        let mut record = ConversationRecord::new(&key());
        record.messages = Some(vec![ChatMessage::new("bot", "Hi! How can I help?", "1")]);
        assert_eq!(
            policy.classify(&InboundEvent::Snapshot(record), HostVisibility::Background),
            Some(Alert::NewConversation { key: key() })
        );
    }

    #[test]
    fn test_inline_update_from_user_alerts() {
        let policy = AlertPolicy::new();
        let mut record = ConversationRecord::new(&key());
        record.extra.insert("sender".into(), "user".into());
        record.extra.insert("text".into(), "where is my order".into());
        assert!(matches!(
            policy.classify(&InboundEvent::Update(record), HostVisibility::Background),
            Some(Alert::NewMessage { .. })
        ));
    }

    #[test]
    fn test_typing_never_alerts() {
        let policy = AlertPolicy::new();
        let event = InboundEvent::Typing { key: key(), signal: TypingSignal::Typing, sender: None };
        assert_eq!(policy.classify(&event, HostVisibility::Background), None);
    }
}
