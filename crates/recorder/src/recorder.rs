use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use callscope_capture::stack::capture_current;
use callscope_capture::{EventKind, RawTransaction, RecordedTransaction, TransactionListener};
use callscope_core::config::Config;
use callscope_core::error::{CallscopeError, Result};
use callscope_core::ids::CallId;
use callscope_core::query::StatusResponse;
use tracing::{debug, trace, warn};

/// Bounded FIFO of recorded transactions. Clones share the same buffer.
#[derive(Clone)]
pub struct Recorder {
    buffer: Arc<Mutex<Buffer>>,
    capacity: usize,
    enabled: bool,
    capture_stack: bool,
}

#[derive(Default)]
struct Buffer {
    entries: VecDeque<Arc<RecordedTransaction>>,
    ids: HashSet<CallId>,
}

impl Recorder {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CallscopeError::InvalidArgument(
                "recorder capacity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            buffer: Arc::new(Mutex::new(Buffer {
                entries: VecDeque::with_capacity(capacity),
                ids: HashSet::with_capacity(capacity),
            })),
            capacity,
            enabled: true,
            capture_stack: false,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(cfg.capacity)?
            .with_enabled(cfg.enabled)
            .with_stack_capture(cfg.capture_stack))
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_stack_capture(mut self, capture_stack: bool) -> Self {
        self.capture_stack = capture_stack;
        self
    }

    fn buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().expect("recorder mutex poisoned")
    }

    /// Stores one transaction, evicting the oldest entry once the buffer is
    /// full. Returns `None` when recording is off or the id is already
    /// buffered.
    pub fn record(&self, kind: EventKind, transaction: RawTransaction) -> Option<CallId> {
        if !self.enabled {
            trace!("recording disabled; dropping transaction");
            return None;
        }

        let stack = match transaction.declared_stack() {
            Some(frames) => frames.to_vec(),
            None if self.capture_stack => capture_current(),
            None => Vec::new(),
        };
        let recorded = RecordedTransaction::new(kind, transaction, stack);
        let id = recorded.id;
        let method = recorded.transaction.method().to_string();
        let host = recorded.transaction.host().to_string();

        let mut buffer = self.buffer();
        if !buffer.ids.insert(id) {
            warn!(%id, "transaction already recorded; ignoring");
            return None;
        }
        buffer.entries.push_back(Arc::new(recorded));
        while buffer.entries.len() > self.capacity {
            if let Some(evicted) = buffer.entries.pop_front() {
                buffer.ids.remove(&evicted.id);
                trace!(id = %evicted.id, "evicted oldest transaction");
            }
        }
        let buffered = buffer.entries.len();
        drop(buffer);

        debug!(%id, ?kind, %method, %host, buffered, "recorded transaction");
        Some(id)
    }

    /// Snapshot of the buffer, oldest first.
    pub fn list(&self) -> Vec<Arc<RecordedTransaction>> {
        self.buffer().entries.iter().cloned().collect()
    }

    pub fn get(&self, id: &CallId) -> Option<Arc<RecordedTransaction>> {
        self.buffer().entries.iter().find(|tx| tx.id == *id).cloned()
    }

    pub fn len(&self) -> usize {
        self.buffer().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Empties the buffer and returns how many transactions were dropped.
    pub fn clear(&self) -> usize {
        let mut buffer = self.buffer();
        let dropped = buffer.entries.len();
        buffer.entries.clear();
        buffer.ids.clear();
        dropped
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            enabled: self.enabled,
            capacity: self.capacity,
            buffered: self.len(),
            capture_stack: self.capture_stack,
        }
    }
}

impl TransactionListener for Recorder {
    fn on_complete(&self, transaction: RawTransaction) {
        self.record(EventKind::Complete, transaction);
    }

    fn on_error(&self, transaction: RawTransaction) {
        self.record(EventKind::Error, transaction);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use callscope_core::model::RawFrame;
    use testkit::{exchange, exchange_with_id};

    use super::*;

    fn hosts(recorder: &Recorder) -> Vec<String> {
        recorder
            .list()
            .iter()
            .map(|tx| tx.transaction.host().to_string())
            .collect()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            Recorder::new(0),
            Err(CallscopeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn evicts_oldest_and_reindexes_from_zero() {
        let recorder = Recorder::new(2).unwrap();
        for host in ["a.local", "b.local", "c.local"] {
            recorder.on_complete(RawTransaction::Exchange(exchange("GET", host, 200, 0.1)));
        }

        let list = recorder.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].transaction.host(), "b.local");
        assert_eq!(list[1].transaction.host(), "c.local");
    }

    #[test]
    fn keeps_at_most_capacity_entries() {
        let recorder = Recorder::new(3).unwrap();
        for i in 0..10 {
            let host = format!("h{i}.local");
            recorder.record(
                EventKind::Complete,
                RawTransaction::Exchange(exchange("GET", &host, 200, 0.1)),
            );
            assert!(recorder.len() <= 3);
        }
        assert_eq!(hosts(&recorder), vec!["h7.local", "h8.local", "h9.local"]);
    }

    #[test]
    fn error_events_are_recorded_with_their_kind() {
        let recorder = Recorder::new(5).unwrap();
        recorder.on_error(RawTransaction::Exchange(exchange("GET", "down.local", 0, 0.0)));
        assert_eq!(recorder.list()[0].kind, EventKind::Error);
    }

    #[test]
    fn duplicate_ids_are_ignored() {
        let recorder = Recorder::new(5).unwrap();
        let id = CallId::new();
        let first = recorder.record(
            EventKind::Complete,
            RawTransaction::Exchange(exchange_with_id(id, "GET", "a.local")),
        );
        let second = recorder.record(
            EventKind::Complete,
            RawTransaction::Exchange(exchange_with_id(id, "GET", "a.local")),
        );
        assert_eq!(first, Some(id));
        assert_eq!(second, None);
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn evicted_ids_can_be_recorded_again() {
        let recorder = Recorder::new(1).unwrap();
        let id = CallId::new();
        recorder.record(
            EventKind::Complete,
            RawTransaction::Exchange(exchange_with_id(id, "GET", "a.local")),
        );
        recorder.record(
            EventKind::Complete,
            RawTransaction::Exchange(exchange("GET", "b.local", 200, 0.1)),
        );
        let again = recorder.record(
            EventKind::Complete,
            RawTransaction::Exchange(exchange_with_id(id, "GET", "a.local")),
        );
        assert_eq!(again, Some(id));
    }

    #[test]
    fn disabled_recorder_drops_everything() {
        let recorder = Recorder::new(5).unwrap().with_enabled(false);
        let id = recorder.record(
            EventKind::Complete,
            RawTransaction::Exchange(exchange("GET", "a.local", 200, 0.1)),
        );
        assert_eq!(id, None);
        assert!(recorder.is_empty());
        assert!(!recorder.status().enabled);
    }

    #[test]
    fn declared_stack_wins_over_capture() {
        let recorder = Recorder::new(5).unwrap().with_stack_capture(true);
        let mut declared = exchange("GET", "a.local", 200, 0.1);
        declared.stack = Some(vec![RawFrame {
            function: "checkout".into(),
            class: Some("shop::cart".into()),
            ..RawFrame::default()
        }]);
        recorder.on_complete(RawTransaction::Exchange(declared));
        recorder.on_complete(RawTransaction::Exchange(exchange("GET", "b.local", 200, 0.1)));

        let list = recorder.list();
        assert_eq!(list[0].stack.len(), 1);
        assert_eq!(list[0].stack[0].function, "checkout");
        assert!(list[1].stack.iter().all(|f| !f.function.is_empty()));
    }

    #[test]
    fn stack_is_empty_without_capture() {
        let recorder = Recorder::new(5).unwrap();
        recorder.on_complete(RawTransaction::Exchange(exchange("GET", "a.local", 200, 0.1)));
        assert!(recorder.list()[0].stack.is_empty());
    }

    #[test]
    fn get_and_clear() {
        let recorder = Recorder::new(5).unwrap();
        let id = recorder
            .record(
                EventKind::Complete,
                RawTransaction::Exchange(exchange("GET", "a.local", 200, 0.1)),
            )
            .unwrap();
        assert!(recorder.get(&id).is_some());
        assert_eq!(recorder.clear(), 1);
        assert!(recorder.get(&id).is_none());
        assert!(recorder.is_empty());
    }

    #[test]
    fn concurrent_callbacks_respect_capacity() {
        let recorder = Recorder::new(50).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let recorder = recorder.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        let host = format!("t{t}-{i}.local");
                        recorder.on_complete(RawTransaction::Exchange(exchange(
                            "GET", &host, 200, 0.01,
                        )));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(recorder.len(), 50);
        assert_eq!(recorder.status().buffered, 50);
    }
}
