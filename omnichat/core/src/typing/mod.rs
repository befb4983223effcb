//! Typing indicators
//!
//! - [`TypingTracker`]: pure state machine over explicit instants
//! - [`TypingService`]: tracker plus expiry timer and transition broadcast
//! - [`TypingEmitter`]: throttled outbound `staff_typing` signals

pub mod emitter;
pub mod service;
pub mod tracker;

use std::time::Duration;

pub use emitter::TypingEmitter;
pub use service::TypingService;
pub use tracker::{TransitionCause, TypingPhase, TypingTracker, TypingTransition};

/// Typing timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingConfig {
    /// Indicator lifetime without a refresh (default: 3 seconds)
    pub indicator_timeout: Duration,
    /// Minimum gap between outbound `staff_typing` frames (default: 2 seconds)
    pub emit_throttle: Duration,
    /// Input idle time before `staff_stop_typing` (default: 2 seconds)
    pub emit_idle: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            indicator_timeout: Duration::from_millis(3000),
            emit_throttle: Duration::from_millis(2000),
            emit_idle: Duration::from_millis(2000),
        }
    }
}

impl TypingConfig {
    /// Emitter for `key` using these timings
    #[must_use]
    pub fn emitter(&self, key: crate::model::ConversationKey) -> TypingEmitter {
        TypingEmitter::new(key, self.emit_throttle, self.emit_idle)
    }
}
