//! Terminal rendering of dashboard state and session lifecycle logging.

use std::io::{self, Write};

use tracing::{error, info, warn};

use omnichat_core::{ChatMessage, ConversationKey, ConversationRecord, SessionEvent};

/// Log one lifecycle event at the level it deserves.
pub fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected => info!("Connected"),
        SessionEvent::Disconnected { code, reason } => {
            info!(?code, %reason, "Disconnected");
        }
        SessionEvent::Reconnecting { attempt, delay } => {
            info!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting"
            );
        }
        SessionEvent::Dormant { attempts } => {
            error!(attempts, "Gave up reconnecting");
        }
        SessionEvent::AuthRequired { code } => {
            warn!(?code, "Credential missing or rejected, sign in again");
        }
        SessionEvent::Inbound(_) => {}
    }
}

/// Writes dashboard views to `out`.
pub struct Monitor<W: Write> {
    out: W,
}

impl<W: Write> Monitor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Print the whole conversation list, newest first.
    pub fn conversations(
        &mut self,
        records: &[ConversationRecord],
        typing: &[ConversationKey],
    ) -> io::Result<()> {
        writeln!(self.out, "── {} conversation(s) ──", records.len())?;
        for record in records {
            let key = record.key();
            let marker = if typing.contains(&key) { " (typing…)" } else { "" };
            let staff = record.assigned_staff.as_deref().unwrap_or("unassigned");
            let preview = record
                .last_message()
                .map(|m| preview(&m.text))
                .unwrap_or_default();
            writeln!(
                self.out,
                "{key:<32} {staff:<12} {:>4} msg  {preview}{marker}",
                record.message_total()
            )?;
        }
        self.out.flush()
    }

    /// Print a newly appended message.
    pub fn message(&mut self, key: &ConversationKey, message: &ChatMessage) -> io::Result<()> {
        writeln!(self.out, "[{key}] {}: {}", message.sender, message.text)?;
        self.out.flush()
    }
}

const PREVIEW_CHARS: usize = 40;

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}
