//! Publish — per-source fan-out of freshly parsed records.
//!
//! Subscribers are held by [`Weak`] reference, so a tailer never keeps a
//! consumer alive. Dead subscribers are pruned on the next publish.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::parser::LogRecord;

static NEXT_SOURCE_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-unique identity of one source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl SourceId {
    pub fn next() -> Self {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receives every record a source appends, synchronously, on the polling task.
///
/// Implementations must return quickly: the scheduler polls the next source
/// only after every subscriber of this one has returned.
pub trait RecordSubscriber: Send + Sync {
    fn on_record(&self, source: SourceId, record: &Arc<LogRecord>);
}

/// Subscriber registry owned by one source.
#[derive(Default)]
pub struct SubscriberList {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Weak<dyn RecordSubscriber>)>>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Weak<dyn RecordSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, subscriber));
        id
    }

    /// Returns false if `id` was not (or no longer) registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(sid, _)| *sid != id);
        entries.len() != before
    }

    /// Number of registered subscribers, including ones not yet pruned
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deliver `record` to every live subscriber.
    ///
    /// Callbacks run without the registry lock held, so a subscriber may
    /// subscribe or unsubscribe from inside its own callback.
    pub fn publish(&self, source: SourceId, record: &Arc<LogRecord>) {
        let (live, dead) = {
            let entries = self.entries.read();
            let mut live = Vec::with_capacity(entries.len());
            let mut dead = false;
            for (_, weak) in entries.iter() {
                match weak.upgrade() {
                    Some(subscriber) => live.push(subscriber),
                    None => dead = true,
                }
            }
            (live, dead)
        };

        for subscriber in live {
            subscriber.on_record(source, record);
        }

        if dead {
            self.entries.write().retain(|(_, weak)| weak.strong_count() > 0);
        }
    }
}

impl fmt::Debug for SubscriberList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberList")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(SourceId, String)>>,
    }

    impl RecordSubscriber for Recorder {
        fn on_record(&self, source: SourceId, record: &Arc<LogRecord>) {
            self.seen.lock().push((source, record.body.clone()));
        }
    }

    fn record(body: &str) -> Arc<LogRecord> {
        Arc::new(LogRecord::system(body))
    }

    #[test]
    fn test_source_ids_are_unique() {
        let a = SourceId::next();
        let b = SourceId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let list = SubscriberList::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        list.subscribe(Arc::downgrade(&a) as Weak<dyn RecordSubscriber>);
        list.subscribe(Arc::downgrade(&b) as Weak<dyn RecordSubscriber>);

        let src = SourceId::next();
        list.publish(src, &record("one"));

        assert_eq!(a.seen.lock().as_slice(), &[(src, "one".to_string())]);
        assert_eq!(b.seen.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let list = SubscriberList::new();
        let a = Arc::new(Recorder::default());
        let id = list.subscribe(Arc::downgrade(&a) as Weak<dyn RecordSubscriber>);

        assert!(list.unsubscribe(id));
        assert!(!list.unsubscribe(id));

        list.publish(SourceId::next(), &record("ignored"));
        assert!(a.seen.lock().is_empty());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let list = SubscriberList::new();
        let a = Arc::new(Recorder::default());
        list.subscribe(Arc::downgrade(&a) as Weak<dyn RecordSubscriber>);
        assert_eq!(list.len(), 1);

        drop(a);
        list.publish(SourceId::next(), &record("x"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_subscriber_can_unsubscribe_itself() {
        struct SelfRemoving {
            list: Arc<SubscriberList>,
            id: Mutex<Option<SubscriptionId>>,
            calls: AtomicU64,
        }

        impl RecordSubscriber for SelfRemoving {
            fn on_record(&self, _source: SourceId, _record: &Arc<LogRecord>) {
                self.calls.fetch_add(1, Ordering::Relaxed);
                if let Some(id) = self.id.lock().take() {
                    self.list.unsubscribe(id);
                }
            }
        }

        let list = Arc::new(SubscriberList::new());
        let sub = Arc::new(SelfRemoving {
            list: Arc::clone(&list),
            id: Mutex::new(None),
            calls: AtomicU64::new(0),
        });
        let id = list.subscribe(Arc::downgrade(&sub) as Weak<dyn RecordSubscriber>);
        *sub.id.lock() = Some(id);

        let src = SourceId::next();
        list.publish(src, &record("a"));
        list.publish(src, &record("b"));

        assert_eq!(sub.calls.load(Ordering::Relaxed), 1);
        assert!(list.is_empty());
    }
}
