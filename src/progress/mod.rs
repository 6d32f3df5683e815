//! Debounced persistence of the reading position.
//!
//! Index and speed changes arrive roughly once per sentence; only the last one
//! in a quiet period is written. Store failures are logged and dropped.

mod store;

pub use store::{DEFAULT_STORE_DIR, FileProgressStore, ProgressStore};

use crate::controller::listen_percent;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ts_rs::TS;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct ProgressRecord {
    pub document_id: String,
    pub listen_position: usize,
    /// 0-100, always derived from `listen_position`.
    pub listen_percent: u8,
    pub speed: f32,
}

impl ProgressRecord {
    pub fn new(
        document_id: impl Into<String>,
        position: usize,
        sentence_count: usize,
        speed: f32,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            listen_position: position,
            listen_percent: listen_percent(Some(position), sentence_count),
            speed,
        }
    }
}

pub struct ProgressTracker {
    document_id: String,
    store: Box<dyn ProgressStore>,
    debounce: Duration,
    pending: Option<(ProgressRecord, Instant)>,
    last_written: Option<ProgressRecord>,
}

impl ProgressTracker {
    pub fn new(
        document_id: impl Into<String>,
        store: Box<dyn ProgressStore>,
        debounce: Duration,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            store,
            debounce,
            pending: None,
            last_written: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn pending(&self) -> Option<&ProgressRecord> {
        self.pending.as_ref().map(|(record, _)| record)
    }

    /// Read the stored record once; failures count as "no record".
    pub fn load(&mut self) -> Option<ProgressRecord> {
        match self.store.get_progress(&self.document_id) {
            Ok(record) => {
                if let Some(record) = &record {
                    debug!(
                        document = %self.document_id,
                        position = record.listen_position,
                        "Loaded progress record"
                    );
                }
                self.last_written = record.clone();
                record
            }
            Err(err) => {
                warn!(document = %self.document_id, "Failed to load progress: {err:#}");
                None
            }
        }
    }

    /// Stored position, when it fits the current sentence list.
    pub fn initial_index(&mut self, sentence_count: usize) -> Option<usize> {
        let record = self.load()?;
        if record.listen_position < sentence_count {
            Some(record.listen_position)
        } else {
            info!(
                position = record.listen_position,
                sentence_count, "Stored position is past the end; ignoring"
            );
            None
        }
    }

    /// Record an index or speed change. Each call restarts the quiet period.
    /// Without a current index nothing is recorded.
    pub fn note(&mut self, index: Option<usize>, sentence_count: usize, speed: f32, now: Instant) {
        let Some(index) = index else {
            return;
        };
        let record = ProgressRecord::new(self.document_id.clone(), index, sentence_count, speed);
        if self.pending.is_none() && self.last_written.as_ref() == Some(&record) {
            return;
        }
        self.pending = Some((record, now));
    }

    /// Write the pending record once the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|(_, at)| now.saturating_duration_since(*at) >= self.debounce);
        if !due {
            return false;
        }
        self.flush()
    }

    /// Write the pending record now. Returns whether a write was attempted.
    pub fn flush(&mut self) -> bool {
        let Some((record, _)) = self.pending.take() else {
            return false;
        };
        match self.store.update_progress(&self.document_id, &record) {
            Ok(()) => {
                debug!(
                    document = %self.document_id,
                    position = record.listen_position,
                    percent = record.listen_percent,
                    "Saved progress"
                );
                self.last_written = Some(record);
            }
            Err(err) => warn!(document = %self.document_id, "Failed to save progress: {err:#}"),
        }
        true
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn tracker(store: &MemoryStore) -> ProgressTracker {
        ProgressTracker::new("book", Box::new(store.clone()), Duration::from_millis(1000))
    }

    #[test]
    fn writes_only_after_quiet_period() {
        let store = MemoryStore::default();
        let mut tracker = tracker(&store);
        let t0 = Instant::now();

        tracker.note(Some(1), 10, 1.0, t0);
        tracker.note(Some(2), 10, 1.0, t0 + Duration::from_millis(600));
        assert!(!tracker.poll(t0 + Duration::from_millis(1200)));
        assert!(store.writes().is_empty());

        assert!(tracker.poll(t0 + Duration::from_millis(1600)));
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].listen_position, 2);
        assert_eq!(writes[0].listen_percent, 20);
    }

    #[test]
    fn unchanged_record_is_not_rewritten() {
        let store = MemoryStore::default();
        let mut tracker = tracker(&store);
        let t0 = Instant::now();
        tracker.note(Some(3), 4, 1.5, t0);
        assert!(tracker.flush());
        tracker.note(Some(3), 4, 1.5, t0);
        assert!(tracker.pending().is_none());
        assert!(!tracker.flush());
        assert_eq!(store.writes().len(), 1);
    }

    #[test]
    fn missing_index_records_nothing() {
        let store = MemoryStore::default();
        let mut tracker = tracker(&store);
        tracker.note(None, 4, 1.0, Instant::now());
        assert!(!tracker.flush());
    }

    #[test]
    fn store_failures_are_swallowed() {
        let store = MemoryStore::default();
        store.set_failing(true);
        let mut tracker = tracker(&store);
        assert_eq!(tracker.initial_index(5), None);
        tracker.note(Some(1), 5, 1.0, Instant::now());
        assert!(tracker.flush());
        assert!(tracker.pending().is_none());
    }

    #[test]
    fn drop_writes_pending_record() {
        let store = MemoryStore::default();
        let mut tracker = tracker(&store);
        tracker.note(Some(4), 8, 1.25, Instant::now());
        drop(tracker);
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].listen_position, 4);
        assert_eq!(writes[0].speed, 1.25);
    }

    #[test]
    fn initial_index_respects_bounds() {
        let store = MemoryStore::default();
        store.insert(ProgressRecord::new("book", 7, 10, 1.0));
        let mut tracker = tracker(&store);
        assert_eq!(tracker.initial_index(10), Some(7));
        assert_eq!(tracker.initial_index(5), None);
    }
}
