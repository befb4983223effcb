//! Outbound Dispatcher
//!
//! Sends staff text through the side channel. A successful send is NOT
//! written into the local view: the server's broadcast echo arrives on the
//! socket and the transcript append path is the single writer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{SyncError, ValidationError};
use crate::side_channel::{SendRequest, SideChannel};

/// Validated text sends.
#[derive(Clone)]
pub struct OutboundDispatcher {
    channel: Arc<dyn SideChannel>,
}

impl OutboundDispatcher {
    /// Dispatcher over `channel`
    pub fn new(channel: Arc<dyn SideChannel>) -> Self {
        Self { channel }
    }

    /// Send `text` to a conversation. Returns once the server accepted or
    /// refused the request.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] for blank text or participant (nothing is sent),
    /// otherwise the side-channel failure.
    pub async fn send_text(
        &self,
        participant_id: &str,
        channel: &str,
        text: &str,
    ) -> Result<(), SyncError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        if participant_id.trim().is_empty() {
            return Err(ValidationError::MissingParticipant.into());
        }

        let request = SendRequest {
            user_id: participant_id.to_string(),
            channel: channel.to_string(),
            text: text.to_string(),
        };
        match self.channel.send_message(&request).await {
            Ok(()) => {
                debug!(user_id = participant_id, channel, "Send accepted, awaiting echo");
                Ok(())
            }
            Err(e) => {
                warn!(user_id = participant_id, channel, error = %e, "Send failed");
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for OutboundDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundDispatcher").finish_non_exhaustive()
    }
}

/// The caller's input buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    text: String,
}

impl Draft {
    /// Empty draft
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// True if there is nothing worth sending
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Take the text out and send it. On any failure the text is put back
    /// exactly as it was.
    ///
    /// # Errors
    ///
    /// Whatever [`OutboundDispatcher::send_text`] returns.
    pub async fn submit(
        &mut self,
        dispatcher: &OutboundDispatcher,
        participant_id: &str,
        channel: &str,
    ) -> Result<(), SyncError> {
        let pending = std::mem::take(&mut self.text);
        let result = dispatcher.send_text(participant_id, channel, &pending).await;
        if result.is_err() {
            self.text = pending;
        }
        result
    }
}
