//! Active follow-ups (contact-form submissions), newest first.

use tracing::debug;

use crate::model::{FollowupId, FollowupRecord};

/// Ordered set of active follow-ups.
#[derive(Debug, Clone, Default)]
pub struct FollowupBoard {
    records: Vec<FollowupRecord>,
}

impl FollowupBoard {
    /// Empty board
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace with a fetched list (newest first). Duplicate ids collapse
    /// to their first occurrence.
    pub fn replace_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = FollowupRecord>,
    {
        let mut seen = std::collections::HashSet::new();
        self.records = records.into_iter().filter(|r| seen.insert(r.id)).collect();
        debug!(count = self.records.len(), "Follow-ups replaced");
    }

    /// Insert a new submission at the head, or replace an existing one in
    /// place.
    pub fn upsert(&mut self, record: FollowupRecord) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.insert(0, record),
        }
    }

    /// Drop a follow-up (deleted or archived to history)
    pub fn remove(&mut self, id: FollowupId) -> Option<FollowupRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Flag a follow-up viewed. Returns true if the flag changed.
    pub fn mark_viewed(&mut self, id: FollowupId) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.viewed => {
                record.viewed = true;
                true
            }
            _ => false,
        }
    }

    /// Badge count
    #[must_use]
    pub fn unviewed_count(&self) -> usize {
        self.records.iter().filter(|r| !r.viewed).count()
    }

    /// Follow-up by id
    #[must_use]
    pub fn get(&self, id: FollowupId) -> Option<&FollowupRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// All active follow-ups, newest first
    #[must_use]
    pub fn list(&self) -> &[FollowupRecord] {
        &self.records
    }

    /// Number of active follow-ups
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn followup(id: i64, viewed: bool) -> FollowupRecord {
        let mut record = FollowupRecord::new(FollowupId(id));
        record.viewed = viewed;
        record
    }

    #[test]
    fn test_badge_count_tracks_viewed() {
        let mut board = FollowupBoard::new();
        board.replace_all(vec![followup(3, false), followup(2, true), followup(1, false)]);
        assert_eq!(board.unviewed_count(), 2);

        assert!(board.mark_viewed(FollowupId(3)));
        assert!(!board.mark_viewed(FollowupId(3)));
        assert!(!board.mark_viewed(FollowupId(99)));
        assert_eq!(board.unviewed_count(), 1);
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut board = FollowupBoard::new();
        board.upsert(followup(1, false));
        board.upsert(followup(2, false));
        assert_eq!(board.list()[0].id, FollowupId(2));

        let mut edited = followup(1, false);
        edited.name = Some("Ana".into());
        board.upsert(edited);
        assert_eq!(board.len(), 2);
        assert_eq!(board.list()[1].name.as_deref(), Some("Ana"));

        assert!(board.remove(FollowupId(2)).is_some());
        assert!(board.remove(FollowupId(2)).is_none());
        assert!(board.get(FollowupId(1)).is_some());
    }

    #[test]
    fn test_replace_all_dedupes() {
        let mut board = FollowupBoard::new();
        board.replace_all(vec![followup(5, false), followup(5, true)]);
        assert_eq!(board.len(), 1);
        assert!(!board.list()[0].viewed);
    }
}
