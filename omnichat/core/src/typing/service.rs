//! Timer-driven typing indicators
//!
//! Wraps [`TypingTracker`] with a background task that sleeps until the
//! earliest deadline, so indicators lapse on their own, and broadcasts
//! every transition.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::model::ConversationKey;
use crate::protocol::InboundEvent;

use super::tracker::{TypingPhase, TypingTracker, TypingTransition};

const TRANSITION_BUFFER: usize = 256;

struct Inner {
    tracker: Mutex<TypingTracker>,
    wake: Notify,
    events: broadcast::Sender<TypingTransition>,
}

impl Inner {
    /// Must be called with the tracker lock held, so the broadcast order
    /// matches the order the tracker produced transitions in.
    fn publish(&self, transitions: Vec<TypingTransition>) -> usize {
        let count = transitions.len();
        for transition in transitions {
            debug!(
                conversation = %transition.key,
                phase = ?transition.phase,
                cause = ?transition.cause,
                "Typing transition"
            );
            // No receivers is fine; state is still queryable.
            let _ = self.events.send(transition);
        }
        count
    }

    /// Run `f` on the tracker and broadcast its transitions under one lock.
    fn commit<F>(&self, f: F) -> usize
    where
        F: FnOnce(&mut TypingTracker, Instant) -> Vec<TypingTransition>,
    {
        let mut tracker = self.tracker.lock();
        let transitions = f(&mut tracker, Instant::now());
        self.publish(transitions)
    }

    fn update<F>(&self, f: F) -> usize
    where
        F: FnOnce(&mut TypingTracker, Instant) -> Vec<TypingTransition>,
    {
        let count = self.commit(f);
        // Any input may have moved the earliest deadline.
        self.wake.notify_one();
        count
    }
}

/// Typing indicators with automatic expiry.
///
/// Needs a tokio runtime; dropping the service stops its timer task.
pub struct TypingService {
    inner: Arc<Inner>,
    timer: JoinHandle<()>,
}

impl TypingService {
    /// Start the service with indicator timeout `timeout`
    #[must_use]
    pub fn spawn(timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(TRANSITION_BUFFER);
        let inner = Arc::new(Inner {
            tracker: Mutex::new(TypingTracker::new(timeout)),
            wake: Notify::new(),
            events,
        });
        let timer = tokio::spawn(expiry_loop(Arc::clone(&inner)));
        Self { inner, timer }
    }

    /// Indicator timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.tracker.lock().timeout()
    }

    /// Feed a decoded event. Returns the number of transitions published.
    pub fn apply(&self, event: &InboundEvent) -> usize {
        self.inner.update(|tracker, now| tracker.apply(event, now))
    }

    /// Typing signal for `key`
    pub fn signal(&self, key: &ConversationKey, sender: Option<String>) -> usize {
        self.inner.update(|tracker, now| {
            let mut out = tracker.expire(now);
            out.extend(tracker.on_signal(key, sender, now));
            out
        })
    }

    /// Explicit stop for `key`
    pub fn stop(&self, key: &ConversationKey) -> usize {
        self.inner.update(|tracker, now| {
            let mut out = tracker.expire(now);
            out.extend(tracker.on_stop(key));
            out
        })
    }

    /// A real message arrived for `key`
    pub fn message(&self, key: &ConversationKey) -> usize {
        self.inner.update(|tracker, now| {
            let mut out = tracker.expire(now);
            out.extend(tracker.on_message(key));
            out
        })
    }

    /// Phase of `key` right now
    #[must_use]
    pub fn state(&self, key: &ConversationKey) -> TypingPhase {
        self.inner.tracker.lock().state(key, Instant::now())
    }

    /// True if `key` is typing right now
    #[must_use]
    pub fn is_typing(&self, key: &ConversationKey) -> bool {
        self.state(key) == TypingPhase::Typing
    }

    /// Sender role of the current typist for `key`
    #[must_use]
    pub fn sender(&self, key: &ConversationKey) -> Option<String> {
        self.inner.tracker.lock().sender(key).map(str::to_owned)
    }

    /// Conversations typing right now
    #[must_use]
    pub fn typing_keys(&self) -> Vec<ConversationKey> {
        self.inner.tracker.lock().typing_keys(Instant::now())
    }

    /// Receiver of every transition from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TypingTransition> {
        self.inner.events.subscribe()
    }

    /// Transitions as a stream. Lagging consumers see a `Lagged` error
    /// item instead of silently missing transitions.
    #[must_use]
    pub fn transitions(&self) -> BroadcastStream<TypingTransition> {
        BroadcastStream::new(self.subscribe())
    }
}

impl Drop for TypingService {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

impl std::fmt::Debug for TypingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingService")
            .field("timeout", &self.timeout())
            .finish_non_exhaustive()
    }
}

async fn expiry_loop(inner: Arc<Inner>) {
    loop {
        let next = inner.tracker.lock().next_deadline();
        match next {
            Some(deadline) => {
                tokio::select! {
                    () = sleep_until(deadline) => {
                        inner.commit(|tracker, now| tracker.expire(now));
                    }
                    () = inner.wake.notified() => {}
                }
            }
            None => inner.wake.notified().await,
        }
    }
}
