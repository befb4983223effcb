//! Dashboard wiring
//!
//! Composes the reconciler, per-conversation transcripts, typing service,
//! follow-up board, viewed guard and dispatcher behind one listener:
//!
//! ```text
//! SessionEvent::Inbound ─┬─ Snapshot/Update ─► ConversationReconciler
//!                        │        └─ inline message / history ─► Transcript
//!                        ├─ Message ──────────► Transcript
//!                        └─ every event ──────► TypingService
//! open_followup(id) ──► ViewedOnceGuard ──► FollowupBoard::mark_viewed
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::connection::{ConnectionManager, SessionEvent, Subscription};
use crate::dispatch::OutboundDispatcher;
use crate::followups::FollowupBoard;
use crate::model::{ChatMessage, ConversationKey, ConversationRecord, FollowupId, FollowupRecord};
use crate::protocol::InboundEvent;
use crate::reconciler::ConversationReconciler;
use crate::side_channel::SideChannel;
use crate::transcript::Transcript;
use crate::typing::{TypingConfig, TypingService};
use crate::viewed::{MarkViewedError, ViewedOnceGuard};

const CHANGE_BUFFER: usize = 256;

/// What part of the dashboard changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardChange {
    /// Conversation list membership or order
    Conversations,
    /// Messages of one conversation
    Transcript(ConversationKey),
    /// Follow-up list or viewed flags
    Followups,
}

struct DashboardState {
    conversations: Mutex<ConversationReconciler>,
    transcripts: DashMap<ConversationKey, Transcript>,
    typing: TypingService,
    followups: Mutex<FollowupBoard>,
    changes: broadcast::Sender<DashboardChange>,
}

impl DashboardState {
    fn notify(&self, change: DashboardChange) {
        let _ = self.changes.send(change);
    }

    fn handle(&self, event: &SessionEvent) {
        let SessionEvent::Inbound(event) = event else {
            return;
        };

        match event {
            InboundEvent::Snapshot(record) | InboundEvent::Update(record) => {
                self.merge_record(record, matches!(event, InboundEvent::Snapshot(_)));
            }
            InboundEvent::Message { key, message } => {
                self.append(key, message.clone());
            }
            InboundEvent::Typing { .. } | InboundEvent::Heartbeat => {}
        }

        self.typing.apply(event);
    }

    fn merge_record(&self, record: &ConversationRecord, snapshot: bool) {
        let key = record.key();
        {
            let mut conversations = self.conversations.lock();
            if snapshot {
                conversations.apply_snapshot(record.clone());
            } else {
                conversations.apply_update(record.clone());
            }
        }
        self.notify(DashboardChange::Conversations);

        if let Some(history) = &record.messages {
            self.transcripts
                .entry(key.clone())
                .or_default()
                .load(history.iter().cloned());
            self.notify(DashboardChange::Transcript(key.clone()));
        }
        if let Some(message) = record.inline_message() {
            self.append(&key, message);
        }
    }

    fn append(&self, key: &ConversationKey, message: ChatMessage) {
        let appended = self.transcripts.entry(key.clone()).or_default().append(message);
        if appended {
            self.notify(DashboardChange::Transcript(key.clone()));
        } else {
            debug!(conversation = %key, "Duplicate message ignored");
        }
    }
}

/// Live dashboard model.
///
/// Needs a tokio runtime (the typing service runs a timer task).
pub struct Dashboard {
    state: Arc<DashboardState>,
    viewed: ViewedOnceGuard,
    dispatcher: OutboundDispatcher,
}

impl Dashboard {
    /// Dashboard whose side effects go through `channel`
    pub fn new(channel: Arc<dyn SideChannel>, typing: &TypingConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            state: Arc::new(DashboardState {
                conversations: Mutex::new(ConversationReconciler::new()),
                transcripts: DashMap::new(),
                typing: TypingService::spawn(typing.indicator_timeout),
                followups: Mutex::new(FollowupBoard::new()),
                changes,
            }),
            viewed: ViewedOnceGuard::new(Arc::clone(&channel)),
            dispatcher: OutboundDispatcher::new(channel),
        }
    }

    /// Listen to `manager`. The dashboard stays attached while the returned
    /// subscription lives.
    pub fn attach(&self, manager: &ConnectionManager) -> Subscription {
        let state = Arc::clone(&self.state);
        manager.add_listener(move |event| state.handle(event))
    }

    /// Feed one session event by hand
    pub fn handle(&self, event: &SessionEvent) {
        self.state.handle(event);
    }

    /// Change notifications
    #[must_use]
    pub fn changes(&self) -> broadcast::Receiver<DashboardChange> {
        self.state.changes.subscribe()
    }

    // ------------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------------

    /// Conversations, newest-touched first
    #[must_use]
    pub fn conversations(&self) -> Vec<ConversationRecord> {
        self.state.conversations.lock().list().to_vec()
    }

    /// One conversation
    #[must_use]
    pub fn conversation(&self, key: &ConversationKey) -> Option<ConversationRecord> {
        self.state.conversations.lock().get(key).cloned()
    }

    /// Replace the list after a re-fetch
    pub fn refresh_conversations(&self, records: Vec<ConversationRecord>) {
        self.state.conversations.lock().replace_all(records);
        self.state.notify(DashboardChange::Conversations);
    }

    /// End or delete conversations. Returns how many were present.
    pub fn end_conversations(&self, keys: &[ConversationKey]) -> usize {
        let removed = self.state.conversations.lock().remove_many(keys);
        for key in keys {
            self.state.transcripts.remove(key);
        }
        if removed > 0 {
            self.state.notify(DashboardChange::Conversations);
        }
        removed
    }

    /// Messages of a conversation, in arrival order
    #[must_use]
    pub fn transcript(&self, key: &ConversationKey) -> Vec<ChatMessage> {
        self.state
            .transcripts
            .get(key)
            .map(|t| t.messages().to_vec())
            .unwrap_or_default()
    }

    /// Replace a transcript with fetched history
    pub fn load_history(&self, key: &ConversationKey, history: Vec<ChatMessage>) {
        self.state
            .transcripts
            .entry(key.clone())
            .or_default()
            .load(history);
        self.state.notify(DashboardChange::Transcript(key.clone()));
    }

    /// True if someone is typing in `key`
    #[must_use]
    pub fn is_typing(&self, key: &ConversationKey) -> bool {
        self.state.typing.is_typing(key)
    }

    /// Typing service (subscribe to transitions here)
    #[must_use]
    pub fn typing(&self) -> &TypingService {
        &self.state.typing
    }

    /// Dispatcher for staff replies
    #[must_use]
    pub fn dispatcher(&self) -> &OutboundDispatcher {
        &self.dispatcher
    }

    // ------------------------------------------------------------------------
    // Follow-ups
    // ------------------------------------------------------------------------

    /// Replace follow-ups with a fetched list
    pub fn load_followups(&self, records: Vec<FollowupRecord>) {
        self.state.followups.lock().replace_all(records);
        self.state.notify(DashboardChange::Followups);
    }

    /// Add or update one follow-up
    pub fn upsert_followup(&self, record: FollowupRecord) {
        self.state.followups.lock().upsert(record);
        self.state.notify(DashboardChange::Followups);
    }

    /// Drop a follow-up (deleted or archived)
    pub fn remove_followup(&self, id: FollowupId) -> Option<FollowupRecord> {
        let removed = self.state.followups.lock().remove(id);
        if removed.is_some() {
            self.state.notify(DashboardChange::Followups);
        }
        removed
    }

    /// Active follow-ups, newest first
    #[must_use]
    pub fn followups(&self) -> Vec<FollowupRecord> {
        self.state.followups.lock().list().to_vec()
    }

    /// Badge count
    #[must_use]
    pub fn unviewed_followups(&self) -> usize {
        self.state.followups.lock().unviewed_count()
    }

    /// The host opened an item. Marks it viewed once per session if it is a
    /// follow-up.
    ///
    /// # Errors
    ///
    /// See [`ViewedOnceGuard::mark_viewed_if_needed`].
    pub async fn open_followup(&self, id: Option<FollowupId>) -> Result<(), MarkViewedError> {
        self.viewed.mark_viewed_if_needed(id).await?;
        if let Some(id) = id {
            if self.state.followups.lock().mark_viewed(id) {
                self.state.notify(DashboardChange::Followups);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("conversations", &self.state.conversations.lock().len())
            .field("followups", &self.state.followups.lock().len())
            .finish_non_exhaustive()
    }
}
