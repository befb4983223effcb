//! Listener registry
//!
//! Dispatch iterates a snapshot of the registry, so listeners may add or
//! remove listeners (themselves included) from inside their callback. A
//! listener removed mid-dispatch is not invoked for the rest of that
//! dispatch. A panicking listener is logged and skipped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::state::SessionEvent;

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Registration handle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct RegistryInner {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.listeners.lock().iter().any(|(lid, _)| *lid == id)
    }
}

/// Subscribers to session events.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn add<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        debug!(listener = id.0, "Listener registered");
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// True when nobody is listening
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener registered when dispatch began.
    /// Returns how many listeners ran to completion.
    pub fn dispatch(&self, event: &SessionEvent) -> usize {
        let snapshot: Vec<(ListenerId, Listener)> = self.inner.listeners.lock().clone();
        let mut delivered = 0;

        for (id, listener) in snapshot {
            if !self.inner.contains(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(listener = id.0, event = event.kind(), "Listener panicked"),
            }
        }
        delivered
    }
}

/// Unsubscribe capability returned by [`ListenerRegistry::add`].
///
/// Holds only a weak reference to the registry; it never keeps a session
/// alive. Dropping it unsubscribes unless [`Subscription::detach`] was
/// called.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<RegistryInner>,
    active: bool,
}

impl Subscription {
    /// Identifier of the registered listener
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Keep the listener registered for the registry's whole lifetime
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) -> bool {
        if !std::mem::take(&mut self.active) {
            return false;
        }
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
