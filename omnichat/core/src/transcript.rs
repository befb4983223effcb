//! Per-conversation message list
//!
//! The only writer of displayed messages. Delivery is at-least-once, so an
//! exact repeat (same sender, text and timestamp) is ignored. Messages
//! without a timestamp cannot be told apart from a genuine repeat and are
//! always appended.

use std::collections::HashSet;

use crate::model::ChatMessage;

/// Ordered messages of one conversation.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    seen: HashSet<ChatMessage>,
}

impl Transcript {
    /// Empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append in arrival order. Returns false for a duplicate.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if !message.ts.is_empty() && !self.seen.insert(message.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace everything with fetched history
    pub fn load<I>(&mut self, history: I)
    where
        I: IntoIterator<Item = ChatMessage>,
    {
        self.messages.clear();
        self.seen.clear();
        for message in history {
            self.append(message);
        }
    }

    /// Messages in order
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Latest message
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
