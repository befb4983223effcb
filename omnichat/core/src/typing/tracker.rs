//! Typing state machine over explicit instants
//!
//! `idle -> typing` on a typing signal; each further signal restarts the
//! timeout. `typing -> idle` on stop, on timeout, or when a real message for
//! the conversation arrives. Every transition is returned to the caller;
//! refreshes are not transitions.
//!
//! Callers apply `expire(now)` before other inputs so that a lapsed
//! indicator is reported idle before it can be re-armed.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::model::ConversationKey;
use crate::protocol::{InboundEvent, TypingSignal};

/// Indicator state of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingPhase {
    /// Nobody typing
    Idle,
    /// Someone typing
    Typing,
}

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// Typing signal received
    Signal,
    /// Explicit stop received
    Stop,
    /// A real message arrived
    Message,
    /// No refresh within the timeout
    Timeout,
}

/// A visible change of indicator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingTransition {
    /// Conversation
    pub key: ConversationKey,
    /// New phase
    pub phase: TypingPhase,
    /// What caused it
    pub cause: TransitionCause,
    /// Sender role of the typist, when known
    pub sender: Option<String>,
}

#[derive(Debug, Clone)]
struct Active {
    sender: Option<String>,
    deadline: Instant,
}

/// Per-conversation typing indicators.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    timeout: Duration,
    active: HashMap<ConversationKey, Active>,
}

impl TypingTracker {
    /// Tracker whose indicators lapse after `timeout` without a refresh
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            active: HashMap::new(),
        }
    }

    /// Indicator timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Typing signal at `now`
    pub fn on_signal(
        &mut self,
        key: &ConversationKey,
        sender: Option<String>,
        now: Instant,
    ) -> Option<TypingTransition> {
        let deadline = now + self.timeout;
        if let Some(active) = self.active.get_mut(key) {
            if active.deadline > now {
                active.deadline = deadline;
                if sender.is_some() {
                    active.sender = sender;
                }
                return None;
            }
        }

        self.active.insert(
            key.clone(),
            Active {
                sender: sender.clone(),
                deadline,
            },
        );
        Some(TypingTransition {
            key: key.clone(),
            phase: TypingPhase::Typing,
            cause: TransitionCause::Signal,
            sender,
        })
    }

    /// Explicit stop
    pub fn on_stop(&mut self, key: &ConversationKey) -> Option<TypingTransition> {
        self.end(key, TransitionCause::Stop)
    }

    /// A real message arrived
    pub fn on_message(&mut self, key: &ConversationKey) -> Option<TypingTransition> {
        self.end(key, TransitionCause::Message)
    }

    fn end(&mut self, key: &ConversationKey, cause: TransitionCause) -> Option<TypingTransition> {
        let active = self.active.remove(key)?;
        Some(TypingTransition {
            key: key.clone(),
            phase: TypingPhase::Idle,
            cause,
            sender: active.sender,
        })
    }

    /// Lapse every indicator whose deadline is at or before `now`
    pub fn expire(&mut self, now: Instant) -> Vec<TypingTransition> {
        let mut lapsed: Vec<ConversationKey> = self
            .active
            .iter()
            .filter(|(_, a)| a.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        lapsed.sort();

        lapsed
            .iter()
            .filter_map(|key| self.end(key, TransitionCause::Timeout))
            .collect()
    }

    /// Feed a decoded event. Expires lapsed indicators first.
    pub fn apply(&mut self, event: &InboundEvent, now: Instant) -> Vec<TypingTransition> {
        let mut transitions = self.expire(now);
        let next = match event {
            InboundEvent::Typing {
                key,
                signal: TypingSignal::Typing,
                sender,
            } => self.on_signal(key, sender.clone(), now),
            InboundEvent::Typing {
                key,
                signal: TypingSignal::StopTyping,
                ..
            } => self.on_stop(key),
            InboundEvent::Message { key, .. } => self.on_message(key),
            InboundEvent::Update(record) if record.inline_message().is_some() => {
                self.on_message(&record.key())
            }
            _ => None,
        };
        transitions.extend(next);
        transitions
    }

    /// Phase of `key` at `now`
    #[must_use]
    pub fn state(&self, key: &ConversationKey, now: Instant) -> TypingPhase {
        if self.active.get(key).is_some_and(|a| a.deadline > now) {
            TypingPhase::Typing
        } else {
            TypingPhase::Idle
        }
    }

    /// True if `key` is typing at `now`
    #[must_use]
    pub fn is_typing(&self, key: &ConversationKey, now: Instant) -> bool {
        self.state(key, now) == TypingPhase::Typing
    }

    /// Sender role of the current typist
    #[must_use]
    pub fn sender(&self, key: &ConversationKey) -> Option<&str> {
        self.active.get(key).and_then(|a| a.sender.as_deref())
    }

    /// Earliest pending deadline
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.values().map(|a| a.deadline).min()
    }

    /// Conversations typing at `now`
    #[must_use]
    pub fn typing_keys(&self, now: Instant) -> Vec<ConversationKey> {
        let mut keys: Vec<ConversationKey> = self
            .active
            .iter()
            .filter(|(_, a)| a.deadline > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatMessage, ConversationRecord};
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn key() -> ConversationKey {
        ConversationKey::new("u1", "web")
    }

    #[test]
    fn test_lapses_after_timeout() {
        let mut tracker = TypingTracker::new(ms(1500));
        let t0 = Instant::now();

        let started = tracker.on_signal(&key(), Some("user".into()), t0).unwrap();
        assert_eq!(started.phase, TypingPhase::Typing);

        assert_eq!(tracker.state(&key(), t0 + ms(1000)), TypingPhase::Typing);
        assert_eq!(tracker.state(&key(), t0 + ms(1600)), TypingPhase::Idle);

        let lapsed = tracker.expire(t0 + ms(1600));
        assert_eq!(lapsed.len(), 1);
        assert_eq!(lapsed[0].cause, TransitionCause::Timeout);
        assert_eq!(lapsed[0].sender.as_deref(), Some("user"));
        assert!(tracker.expire(t0 + ms(5000)).is_empty());
    }

    #[test]
    fn test_refresh_restarts_timeout_silently() {
        let mut tracker = TypingTracker::new(ms(1500));
        let t0 = Instant::now();
        tracker.on_signal(&key(), None, t0);

        assert_eq!(tracker.on_signal(&key(), None, t0 + ms(1000)), None);
        assert!(tracker.is_typing(&key(), t0 + ms(2000)));
        assert!(tracker.expire(t0 + ms(2000)).is_empty());
        assert_eq!(tracker.next_deadline(), Some(t0 + ms(2500)));
        assert!(!tracker.is_typing(&key(), t0 + ms(2500)));
    }

    #[test]
    fn test_message_ends_typing_immediately() {
        let mut tracker = TypingTracker::new(ms(3000));
        let t0 = Instant::now();
        tracker.on_signal(&key(), None, t0);

        let event = InboundEvent::Message {
            key: key(),
            message: ChatMessage::new("user", "hi", "1"),
        };
        let transitions = tracker.apply(&event, t0 + ms(10));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].cause, TransitionCause::Message);
        assert_eq!(tracker.state(&key(), t0 + ms(10)), TypingPhase::Idle);
    }

    #[test]
    fn test_inline_update_counts_as_message() {
        let mut tracker = TypingTracker::new(ms(3000));
        let t0 = Instant::now();
        tracker.on_signal(&key(), None, t0);

        let mut record = ConversationRecord::new(&key());
        record.extra.insert("text".into(), "hello".into());
        let transitions = tracker.apply(&InboundEvent::Update(record), t0);
        assert_eq!(transitions[0].cause, TransitionCause::Message);
    }

    #[test]
    fn test_stop_and_stale_entries() {
        let mut tracker = TypingTracker::new(ms(1000));
        let t0 = Instant::now();
        tracker.on_signal(&key(), None, t0);
        assert_eq!(tracker.on_stop(&key()).unwrap().cause, TransitionCause::Stop);
        assert_eq!(tracker.on_stop(&key()), None);

        tracker.on_signal(&key(), None, t0);
        let signal = InboundEvent::Typing {
            key: key(),
            signal: TypingSignal::Typing,
            sender: None,
        };
        let transitions = tracker.apply(&signal, t0 + ms(1500));
        let causes: Vec<_> = transitions.iter().map(|t| t.cause).collect();
        assert_eq!(causes, vec![TransitionCause::Timeout, TransitionCause::Signal]);
    }

    #[test]
    fn test_independent_conversations() {
        let mut tracker = TypingTracker::new(ms(1000));
        let t0 = Instant::now();
        let other = ConversationKey::new("u2", "sms");
        tracker.on_signal(&key(), None, t0);
        tracker.on_signal(&other, None, t0 + ms(500));

        assert_eq!(tracker.typing_keys(t0 + ms(1200)), vec![other.clone()]);
        assert_eq!(tracker.expire(t0 + ms(1200)).len(), 1);
        assert!(tracker.is_typing(&other, t0 + ms(1200)));
    }
}
