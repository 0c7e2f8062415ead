use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::record::MessageRecord;

/// Size bounds of a [`CorrelationStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreLimits {
    /// Eviction runs when a new id arrives while the store holds more than this
    pub threshold: usize,
    /// Entries removed per eviction pass
    pub evict_batch: usize,
    /// Lines kept per role per message
    pub history_per_role: usize,
}

impl StoreLimits {
    pub const PRODUCTION: StoreLimits = StoreLimits {
        threshold: 1000,
        evict_batch: 100,
        history_per_role: 10,
    };

    pub const DEBUG: StoreLimits = StoreLimits {
        threshold: 10,
        evict_batch: 3,
        history_per_role: 10,
    };
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::PRODUCTION
    }
}

/// message id → [`MessageRecord`], bounded by batch eviction of the least
/// recently touched entries.
///
/// Not synchronised; the correlator wraps it in a mutex.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    messages: HashMap<String, MessageRecord>,
    limits: StoreLimits,
}

impl CorrelationStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            messages: HashMap::new(),
            limits,
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<&MessageRecord> {
        self.messages.get(message_id)
    }

    pub fn values(&self) -> impl Iterator<Item = &MessageRecord> {
        self.messages.values()
    }

    /// Look up `message_id`, creating it if absent, and mark it touched at `now`.
    ///
    /// Returns the record and whether it was created. Creating a record while
    /// the store is above its threshold first evicts one batch.
    pub fn touch(&mut self, message_id: &str, now: DateTime<Utc>) -> (&mut MessageRecord, bool) {
        if !self.messages.contains_key(message_id) && self.messages.len() > self.limits.threshold {
            self.evict_oldest(self.limits.evict_batch);
        }

        let history = self.limits.history_per_role;
        let mut created = false;
        let record = self
            .messages
            .entry(message_id.to_string())
            .or_insert_with(|| {
                created = true;
                MessageRecord::new(message_id, now, history)
            });
        record.touch_time = now;
        (record, created)
    }

    /// Remove the `n` entries with the smallest touch time. Returns how many went.
    pub fn evict_oldest(&mut self, n: usize) -> usize {
        let mut by_age: Vec<(DateTime<Utc>, &str)> = self
            .messages
            .values()
            .map(|m| (m.touch_time, m.message_id.as_str()))
            .collect();
        by_age.sort_by_key(|(touched, _)| *touched);

        let doomed: Vec<String> = by_age
            .into_iter()
            .take(n)
            .map(|(_, id)| id.to_string())
            .collect();

        for id in &doomed {
            self.messages.remove(id);
        }

        debug!(
            removed = doomed.len(),
            remaining = self.messages.len(),
            "expired entries from correlation store"
        );
        doomed.len()
    }

    /// Copy up to `max` records into `out`, replacing its contents.
    ///
    /// Order is the map's own iteration order; sort on the consumer side.
    pub fn fill(&self, out: &mut Vec<MessageRecord>, max: usize) {
        out.clear();
        out.extend(self.messages.values().take(max).cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn limits(threshold: usize, evict_batch: usize) -> StoreLimits {
        StoreLimits {
            threshold,
            evict_batch,
            history_per_role: 10,
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_touch_creates_once() {
        let mut store = CorrelationStore::new(StoreLimits::PRODUCTION);
        let (_, created) = store.touch("A", t0());
        assert!(created);
        let (rec, created) = store.touch("A", t0() + Duration::seconds(5));
        assert!(!created);
        assert_eq!(rec.touch_time, t0() + Duration::seconds(5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_no_eviction_at_threshold() {
        let mut store = CorrelationStore::new(limits(5, 2));
        for i in 0..6 {
            store.touch(&format!("m{}", i), t0() + Duration::seconds(i));
        }
        // 6 entries: the 6th insert saw len 5, not above threshold
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_eviction_removes_batch_of_oldest() {
        let mut store = CorrelationStore::new(limits(5, 2));
        for i in 0..6 {
            store.touch(&format!("m{}", i), t0() + Duration::seconds(i));
        }
        // refresh m0 so m1 and m2 become the oldest
        store.touch("m0", t0() + Duration::seconds(100));

        let pre = store.len();
        let (_, created) = store.touch("new", t0() + Duration::seconds(200));
        assert!(created);

        assert_eq!(store.len(), pre + 1 - 2);
        assert!(store.get("m1").is_none());
        assert!(store.get("m2").is_none());
        assert!(store.get("m0").is_some());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn test_existing_id_never_evicts() {
        let mut store = CorrelationStore::new(limits(2, 1));
        for i in 0..4 {
            store.touch(&format!("m{}", i), t0() + Duration::seconds(i));
        }
        let before = store.len();
        store.touch("m3", t0() + Duration::seconds(50));
        assert_eq!(store.len(), before);
    }

    #[test]
    fn test_evict_more_than_present() {
        let mut store = CorrelationStore::new(limits(10, 3));
        store.touch("a", t0());
        assert_eq!(store.evict_oldest(5), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_fill_replaces_and_bounds() {
        let mut store = CorrelationStore::new(StoreLimits::PRODUCTION);
        for i in 0..5 {
            store.touch(&format!("m{}", i), t0());
        }

        let mut out = vec![MessageRecord::new("stale", t0(), 1)];
        store.fill(&mut out, 3);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|m| m.message_id != "stale"));

        store.fill(&mut out, 100);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(StoreLimits::default(), StoreLimits::PRODUCTION);
        assert!(StoreLimits::DEBUG.threshold < StoreLimits::PRODUCTION.threshold);
        assert!(StoreLimits::DEBUG.evict_batch < StoreLimits::PRODUCTION.evict_batch);
    }
}
