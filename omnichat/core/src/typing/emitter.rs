//! Outbound staff typing signals
//!
//! Emits `staff_typing` at most once per throttle window while the local
//! input keeps changing, and `staff_stop_typing` once input has been idle
//! for the idle window, or right away when the text is sent or cleared.

use std::time::Duration;

use tokio::time::Instant;

use crate::model::ConversationKey;
use crate::protocol::OutboundFrame;

/// Typing emission for one conversation's input box.
#[derive(Debug, Clone)]
pub struct TypingEmitter {
    key: ConversationKey,
    throttle: Duration,
    idle: Duration,
    last_sent: Option<Instant>,
    stop_due: Option<Instant>,
}

impl TypingEmitter {
    /// Emitter for `key`
    #[must_use]
    pub fn new(key: ConversationKey, throttle: Duration, idle: Duration) -> Self {
        Self {
            key,
            throttle,
            idle,
            last_sent: None,
            stop_due: None,
        }
    }

    /// Conversation this emitter signals for
    #[must_use]
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// True between a `staff_typing` and its matching stop
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stop_due.is_some()
    }

    /// When the pending stop fires, if any
    #[must_use]
    pub fn stop_deadline(&self) -> Option<Instant> {
        self.stop_due
    }

    /// The input now reads `text`.
    pub fn on_input(&mut self, text: &str, now: Instant) -> Option<OutboundFrame> {
        if text.trim().is_empty() {
            return self.stop();
        }

        self.stop_due = Some(now + self.idle);
        let throttled = self
            .last_sent
            .is_some_and(|sent| now.duration_since(sent) < self.throttle);
        if throttled {
            return None;
        }
        self.last_sent = Some(now);
        Some(OutboundFrame::staff_typing(&self.key))
    }

    /// Stop frame if the idle window has passed at `now`
    pub fn poll(&mut self, now: Instant) -> Option<OutboundFrame> {
        match self.stop_due {
            Some(due) if due <= now => self.stop(),
            _ => None,
        }
    }

    /// The text was sent
    pub fn on_sent(&mut self) -> Option<OutboundFrame> {
        self.stop()
    }

    fn stop(&mut self) -> Option<OutboundFrame> {
        self.last_sent = None;
        self.stop_due
            .take()
            .map(|_| OutboundFrame::staff_stop_typing(&self.key))
    }
}
