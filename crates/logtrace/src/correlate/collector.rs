//! Collector — cross-stream correlation of receiver, engine and sender logs.
//!
//! The [`Correlator`] subscribes to one tailer per [`StreamRole`] and folds
//! every record naming a message into a [`CorrelationStore`] keyed by message id.
//! Callbacks run on the scheduler task, so each one holds the store lock only
//! for a lookup and a push (plus the occasional eviction sort).

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::parser::metrics::TailMetrics;
use crate::parser::{LogRecord, RecordKind};
use crate::source::{RecordSubscriber, SourceId, SourceTailer, SubscriptionId};

use super::pattern::{self, Extraction};
use super::record::{MessageRecord, StreamRole};
use super::store::{CorrelationStore, StoreLimits};

struct Attachment {
    role: StreamRole,
    tailer: Weak<SourceTailer>,
    subscription: SubscriptionId,
}

pub struct Correlator {
    store: Mutex<CorrelationStore>,
    roles: RwLock<HashMap<SourceId, StreamRole>>,
    attachments: Mutex<Vec<Attachment>>,
    metrics: Arc<TailMetrics>,
}

impl Correlator {
    pub fn new(limits: StoreLimits, metrics: Arc<TailMetrics>) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(CorrelationStore::new(limits)),
            roles: RwLock::new(HashMap::new()),
            attachments: Mutex::new(Vec::new()),
            metrics,
        })
    }

    pub fn limits(&self) -> StoreLimits {
        self.store.lock().limits()
    }

    // ── Wiring ──────────────────────────────────────────────────

    /// Subscribe to `tailer` as the source of `role`.
    ///
    /// The tailer only holds a weak reference back; dropping the last
    /// `Arc<Correlator>` stops correlation without touching the tailer.
    pub fn attach(self: &Arc<Self>, role: StreamRole, tailer: &Arc<SourceTailer>) {
        self.roles.write().insert(tailer.id(), role);
        let subscription = tailer.subscribe(self);
        self.attachments.lock().push(Attachment {
            role,
            tailer: Arc::downgrade(tailer),
            subscription,
        });
        info!(
            role = role.as_str(),
            source = %tailer.name(),
            "correlator attached"
        );
    }

    /// Remove every subscription made by [`attach`](Self::attach).
    pub fn detach(&self) {
        let attachments = std::mem::take(&mut *self.attachments.lock());
        for a in attachments {
            if let Some(tailer) = a.tailer.upgrade() {
                tailer.unsubscribe(a.subscription);
                debug!(role = a.role.as_str(), source = %tailer.name(), "correlator detached");
            }
        }
        self.roles.write().clear();
    }

    // ── Ingest ──────────────────────────────────────────────────

    /// Fold one record from the `role` stream into the store.
    ///
    /// Ingress looks at Data records only. Process and egress examine every
    /// record, so wrapped engine or sender output still reaches the message.
    /// Lines that carry no message id are ignored.
    pub fn ingest(&self, role: StreamRole, record: &Arc<LogRecord>) {
        if role == StreamRole::Ingress && record.kind != RecordKind::Data {
            return;
        }
        let Some(extraction) = pattern::extract(role, &record.body) else {
            return;
        };

        let mut store = self.store.lock();
        let before = store.len();
        let (message, created) = store.touch(extraction.message_id(), Utc::now());

        message.history_mut(role).push(Arc::clone(record));
        match extraction {
            Extraction::Accepted { .. } => {
                message.rx_time = record.source_time.clone();
            }
            Extraction::Scored { score, .. } => {
                message.score = Some(score);
            }
            Extraction::Seen { .. } => {}
        }

        let after = store.len();
        drop(store);

        self.metrics.record_message(created);
        if created && after <= before {
            let evicted = (before + 1 - after) as u64;
            self.metrics.record_eviction(evicted);
            debug!(evicted, size = after, "correlation store evicted oldest messages");
        }
    }

    // ── Read interface ──────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<MessageRecord> {
        self.store.lock().get(message_id).cloned()
    }

    /// Replace `out` with up to `max` current messages, in store order.
    pub fn fill_buffer(&self, out: &mut Vec<MessageRecord>, max: usize) {
        self.store.lock().fill(out, max);
    }
}

impl RecordSubscriber for Correlator {
    fn on_record(&self, source: SourceId, record: &Arc<LogRecord>) {
        let role = self.roles.read().get(&source).copied();
        if let Some(role) = role {
            self.ingest(role, record);
        }
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("messages", &self.len())
            .field("attached", &self.attachments.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_line, Grammar};
    use crate::source::TailerOptions;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn plain(line: &str) -> Arc<LogRecord> {
        Arc::new(parse_line(line, Grammar::Plain))
    }

    fn correlator(limits: StoreLimits) -> Arc<Correlator> {
        Correlator::new(limits, Arc::new(TailMetrics::new()))
    }

    #[test]
    fn test_accepted_sets_rx_time() {
        let c = correlator(StoreLimits::PRODUCTION);
        c.ingest(
            StreamRole::Ingress,
            &plain("1001 10:00:00.000 TX: <250 MSGID1 Message accepted for delivery>"),
        );

        let msg = c.get("MSGID1").unwrap();
        assert_eq!(msg.rx_time.as_deref(), Some("10:00:00.000"));
        assert_eq!(msg.ingress.len(), 1);
        assert!(msg.score.is_none());
    }

    #[test]
    fn test_score_annotation() {
        let c = correlator(StoreLimits::PRODUCTION);
        c.ingest(
            StreamRole::Ingress,
            &plain("7 10:00:01.250 B0123456789AB.0123456789AB.00F3.mml SpamProfiler score: 12, rescan: 1, bulk: 0"),
        );
        let msg = c.get("B0123456789AB").unwrap();
        assert_eq!(msg.score.map(|s| (s.score, s.rescan, s.bulk)), Some((12, 1, 0)));
        assert!(msg.rx_time.is_none());
    }

    #[test]
    fn test_roles_merge_into_one_record() {
        let c = correlator(StoreLimits::PRODUCTION);
        let file = "B0123456789AB.0123456789AB.00F3.mml";
        c.ingest(StreamRole::Ingress, &plain(&format!("1 10:00:00.000 queued {}", file)));
        c.ingest(StreamRole::Process, &plain(&format!("2 10:00:01.000 scanning {}", file)));
        c.ingest(StreamRole::Egress, &plain(&format!("3 10:00:02.000 delivered {}", file)));
        c.ingest(StreamRole::Egress, &plain(&format!("3 10:00:03.000 done {}", file)));

        assert_eq!(c.len(), 1);
        let msg = c.get("B0123456789AB").unwrap();
        assert_eq!(msg.roles_seen(), StreamRole::ALL.to_vec());
        assert_eq!(msg.egress.first_seen.as_deref(), Some("10:00:02.000"));
        assert_eq!(msg.egress.last_seen.as_deref(), Some("10:00:03.000"));
    }

    #[test]
    fn test_ingress_ignores_non_data_records() {
        let c = correlator(StoreLimits::PRODUCTION);
        let body = "TX: <250 MSGID1 Message accepted for delivery>";
        c.ingest(StreamRole::Ingress, &Arc::new(LogRecord::system(body)));
        c.ingest(StreamRole::Ingress, &plain(body));
        c.ingest(StreamRole::Ingress, &plain("    queued B0123456789AB.0123456789AB.00F3.mml"));
        assert!(c.is_empty());
    }

    #[test]
    fn test_process_and_egress_continuations_count() {
        let c = correlator(StoreLimits::PRODUCTION);
        let line = plain("    retrying B0123456789AB.0123456789AB.00F3.mml");
        assert_eq!(line.kind, RecordKind::Continuation);

        c.ingest(StreamRole::Process, &line);
        c.ingest(StreamRole::Egress, &line);

        assert_eq!(c.len(), 1);
        let msg = c.get("B0123456789AB").unwrap();
        assert_eq!(msg.process.len(), 1);
        assert_eq!(msg.egress.len(), 1);
        assert!(msg.ingress.is_empty());
        // continuation lines carry no source time
        assert!(msg.process.first_seen.is_none());
    }

    #[test]
    fn test_unmatched_lines_ignored() {
        let c = correlator(StoreLimits::PRODUCTION);
        c.ingest(StreamRole::Ingress, &plain("1 10:00:00.000 RX: EHLO example.com"));
        assert!(c.is_empty());
    }

    #[test]
    fn test_eviction_is_counted() {
        let metrics = Arc::new(TailMetrics::new());
        let c = Correlator::new(
            StoreLimits {
                threshold: 2,
                evict_batch: 2,
                history_per_role: 10,
            },
            Arc::clone(&metrics),
        );
        for i in 0..4 {
            let line = format!(
                "1 10:00:0{}.000 TX: <250 ID{} Message accepted for delivery>",
                i, i
            );
            c.ingest(StreamRole::Ingress, &plain(&line));
        }
        // fourth insert saw 3 > 2 and evicted two
        assert_eq!(c.len(), 2);
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_evicted, 2);
        assert_eq!(snap.messages_created, 4);
    }

    #[test]
    fn test_fill_buffer_bound() {
        let c = correlator(StoreLimits::PRODUCTION);
        for i in 0..5 {
            let line = format!("1 10:00:00.000 TX: <250 ID{} Message accepted for delivery>", i);
            c.ingest(StreamRole::Ingress, &plain(&line));
        }
        let mut out = Vec::new();
        c.fill_buffer(&mut out, 2);
        assert_eq!(out.len(), 2);
        c.fill_buffer(&mut out, 50);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_attach_and_detach_via_tailer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("MMReceiver.log");
        fs::write(&path, "").unwrap();

        let tailer = SourceTailer::new(
            "receiver",
            dir.path(),
            "MMReceiver",
            Grammar::Plain,
            TailerOptions::default(),
            Arc::new(TailMetrics::new()),
        );
        let c = correlator(StoreLimits::PRODUCTION);
        c.attach(StreamRole::Ingress, &tailer);
        tailer.poll();

        let mut f = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "1 10:00:00.000 TX: <250 A1 Message accepted for delivery>").unwrap();
        tailer.poll();
        assert!(c.get("A1").is_some());

        c.detach();
        writeln!(f, "1 10:00:01.000 TX: <250 A2 Message accepted for delivery>").unwrap();
        tailer.poll();
        assert!(c.get("A2").is_none());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_dropped_correlator_stops_receiving() {
        let tailer = SourceTailer::new(
            "engine",
            "/nonexistent/logtrace",
            "MMEngine",
            Grammar::Plain,
            TailerOptions::default(),
            Arc::new(TailMetrics::new()),
        );
        let c = correlator(StoreLimits::PRODUCTION);
        c.attach(StreamRole::Process, &tailer);
        drop(c);
        // no live subscriber left to call
        tailer.poll();
        assert_eq!(tailer.count(), 1);
    }
}
