//! Conversation Reconciler
//!
//! Keeps the client's set of live conversations. Snapshots and updates are
//! merged the same way: drop whatever record shares the key, then put the
//! incoming record at the head. The newest-touched conversation therefore
//! always sits first and no timestamp sorting is needed.
//!
//! Out-of-order retransmissions resolve as last-applied-wins. Timestamps
//! are carried but never compared.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{ConversationKey, ConversationRecord};
use crate::protocol::InboundEvent;

/// Ordered, key-unique set of conversations.
#[derive(Debug, Clone, Default)]
pub struct ConversationReconciler {
    records: Vec<ConversationRecord>,
}

impl ConversationReconciler {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a full-replacement record.
    pub fn apply_snapshot(&mut self, record: ConversationRecord) {
        self.merge(record);
    }

    /// Apply an incremental record. Unknown keys are inserted.
    pub fn apply_update(&mut self, record: ConversationRecord) {
        self.merge(record);
    }

    /// Apply a decoded event. Returns true if the set changed shape.
    pub fn apply(&mut self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::Snapshot(record) => {
                self.apply_snapshot(record.clone());
                true
            }
            InboundEvent::Update(record) => {
                self.apply_update(record.clone());
                true
            }
            _ => false,
        }
    }

    fn merge(&mut self, record: ConversationRecord) {
        let replaced = self.take(&record.key()).is_some();
        debug!(
            participant = %record.participant_id,
            channel = %record.channel,
            replaced,
            "Conversation merged"
        );
        self.records.insert(0, record);
    }

    fn take(&mut self, key: &ConversationKey) -> Option<ConversationRecord> {
        let index = self.records.iter().position(|r| r.has_key(key))?;
        Some(self.records.remove(index))
    }

    /// Current records, newest-touched first
    #[must_use]
    pub fn list(&self) -> &[ConversationRecord] {
        &self.records
    }

    /// Record for `key`
    #[must_use]
    pub fn get(&self, key: &ConversationKey) -> Option<&ConversationRecord> {
        self.records.iter().find(|r| r.has_key(key))
    }

    /// True if `key` is present
    #[must_use]
    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of conversations
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove a conversation (end chat, delete)
    pub fn remove_by_key(&mut self, key: &ConversationKey) -> Option<ConversationRecord> {
        self.take(key)
    }

    /// Remove several conversations at once. Returns how many were present.
    pub fn remove_many<'a, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a ConversationKey>,
    {
        let keys: HashSet<&ConversationKey> = keys.into_iter().collect();
        let before = self.records.len();
        self.records.retain(|r| !keys.contains(&r.key()));
        before - self.records.len()
    }

    /// Replace the whole set with freshly fetched records (given newest
    /// first). Duplicate keys collapse to their first occurrence.
    pub fn replace_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = ConversationRecord>,
    {
        let mut seen = HashSet::new();
        self.records = records
            .into_iter()
            .filter(|r| seen.insert(r.key()))
            .collect();
        debug!(count = self.records.len(), "Conversations replaced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn record(user: &str, channel: &str, ts: &str) -> ConversationRecord {
        ConversationRecord::new(&ConversationKey::new(user, channel)).with_last_updated(ts)
    }

    fn keys(r: &ConversationReconciler) -> Vec<(String, String)> {
        r.list()
            .iter()
            .map(|c| (c.participant_id.clone(), c.channel.clone()))
            .collect()
    }

    #[test]
    fn test_snapshot_then_update_keeps_latest() {
        let mut r = ConversationReconciler::new();
        r.apply_snapshot(record("u1", "web", "t1"));
        r.apply_update(record("u1", "web", "t2"));

        assert_eq!(r.len(), 1);
        assert_eq!(r.list()[0].key(), ConversationKey::new("u1", "web"));
        assert_eq!(r.list()[0].last_updated.as_deref(), Some("t2"));
    }

    #[test]
    fn test_newest_touched_floats_to_head() {
        let mut r = ConversationReconciler::new();
        r.apply_snapshot(record("a", "sms", "1"));
        r.apply_snapshot(record("b", "sms", "2"));
        r.apply_snapshot(record("c", "web", "3"));
        r.apply_update(record("a", "sms", "4"));

        assert_eq!(
            keys(&r),
            vec![
                ("a".into(), "sms".into()),
                ("c".into(), "web".into()),
                ("b".into(), "sms".into()),
            ]
        );
    }

    #[test]
    fn test_same_participant_different_channel_are_distinct() {
        let mut r = ConversationReconciler::new();
        r.apply_update(record("u1", "sms", "1"));
        r.apply_update(record("u1", "web", "1"));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_out_of_order_is_last_applied_wins() {
        let mut r = ConversationReconciler::new();
        r.apply_update(record("u1", "web", "t2"));
        r.apply_update(record("u1", "web", "t1"));
        assert_eq!(r.list()[0].last_updated.as_deref(), Some("t1"));
    }

    #[test]
    fn test_apply_ignores_non_record_events() {
        let mut r = ConversationReconciler::new();
        assert!(!r.apply(&InboundEvent::Heartbeat));
        assert!(r.apply(&InboundEvent::Update(record("u1", "web", "1"))));
        assert!(r.contains(&ConversationKey::new("u1", "web")));
    }

    #[test]
    fn test_remove_by_key_and_many() {
        let mut r = ConversationReconciler::new();
        for user in ["a-1", "b-2", "c-3"] {
            r.apply_update(record(user, "web", "1"));
        }

        let removed = r.remove_by_key(&ConversationKey::new("b-2", "web")).unwrap();
        assert_eq!(removed.participant_id, "b-2");
        assert!(r.remove_by_key(&ConversationKey::new("b-2", "web")).is_none());

        let gone = [
            ConversationKey::new("a-1", "web"),
            ConversationKey::new("zz", "web"),
        ];
        assert_eq!(r.remove_many(&gone), 1);
        assert_eq!(keys(&r), vec![("c-3".into(), "web".into())]);
    }

    #[test]
    fn test_remove_many_over_large_batch() {
        let mut r = ConversationReconciler::new();
        for user in 0..100 {
            r.apply_update(record(&format!("u{user}"), "sms", "1"));
        }

        let gone: Vec<ConversationKey> = (0..100)
            .filter(|n| n % 2 == 0)
            .chain([0, 2, 4])
            .map(|n| ConversationKey::new(format!("u{n}"), "sms"))
            .collect();
        assert_eq!(r.remove_many(&gone), 50);
        assert_eq!(r.len(), 50);
        assert!(!r.contains(&ConversationKey::new("u0", "sms")));
        assert!(r.contains(&ConversationKey::new("u1", "sms")));
    }

    #[test]
    fn test_replace_all_dedupes_first_wins() {
        let mut r = ConversationReconciler::new();
        r.apply_update(record("old", "web", "0"));
        r.replace_all(vec![
            record("u1", "web", "new"),
            record("u2", "sms", "x"),
            record("u1", "web", "stale"),
        ]);

        assert_eq!(r.len(), 2);
        assert!(!r.contains(&ConversationKey::new("old", "web")));
        assert_eq!(
            r.get(&ConversationKey::new("u1", "web")).unwrap().last_updated.as_deref(),
            Some("new")
        );
    }

    fn arb_record() -> impl Strategy<Value = ConversationRecord> {
        (
            prop::sample::select(vec!["u1", "u2", "u-3", "u4"]),
            prop::sample::select(vec!["web", "sms"]),
            "[a-z0-9]{1,6}",
        )
            .prop_map(|(user, channel, ts)| record(user, channel, &ts))
    }

    proptest! {
        #[test]
        fn prop_one_record_per_key_last_write_wins(
            ops in prop::collection::vec((any::<bool>(), arb_record()), 0..60)
        ) {
            let mut r = ConversationReconciler::new();
            let mut latest = std::collections::HashMap::new();

            for (snapshot, rec) in ops {
                latest.insert(rec.key(), rec.clone());
                if snapshot {
                    r.apply_snapshot(rec);
                } else {
                    r.apply_update(rec);
                }
            }

            let mut seen = HashSet::new();
            for rec in r.list() {
                prop_assert!(seen.insert(rec.key()), "duplicate key {}", rec.key());
                prop_assert_eq!(Some(rec), latest.get(&rec.key()));
            }
            prop_assert_eq!(r.len(), latest.len());
        }

        #[test]
        fn prop_reapplying_head_record_is_idempotent(
            ops in prop::collection::vec(arb_record(), 1..40)
        ) {
            let mut r = ConversationReconciler::new();
            for rec in ops {
                r.apply_update(rec);
            }
            let head = r.list()[0].clone();
            let before = r.list().to_vec();
            r.apply_update(head);
            prop_assert_eq!(r.list(), before.as_slice());
        }
    }
}
