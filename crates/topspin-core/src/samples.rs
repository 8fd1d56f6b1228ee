//! In-memory log of swing samples received over BLE.
//!
//! Notifications arrive on the btleplug notification task as raw payloads;
//! ingestion is synchronous and lock-light so the handler never blocks the
//! BLE stream. Readers take snapshots, never references into the log.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use topspin_types::{SAMPLE_LEN, decode_sample};

/// Append-only log of swing counts for the current session.
///
/// The log survives disconnects: samples remain readable after the link
/// drops and are cleared only when a new connection attempt begins (or on
/// an explicit [`clear`](SampleLog::clear)).
#[derive(Debug, Default)]
pub struct SampleLog {
    samples: RwLock<Vec<u32>>,
    dropped: AtomicU64,
}

impl SampleLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and append a notification payload.
    ///
    /// Returns the decoded swing count, or `None` if the payload was
    /// malformed. Malformed payloads are dropped with a warning and counted;
    /// they never terminate the stream.
    pub fn ingest(&self, payload: &[u8]) -> Option<u32> {
        match decode_sample(payload) {
            Ok(count) => {
                if let Ok(mut samples) = self.samples.write() {
                    samples.push(count);
                }
                Some(count)
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    payload_len = payload.len(),
                    expected = SAMPLE_LEN,
                    "Dropping malformed swing sample"
                );
                None
            }
        }
    }

    /// Snapshot of all samples ingested so far, in arrival order.
    pub fn snapshot(&self) -> Vec<u32> {
        self.samples.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// The most recent swing count, if any.
    pub fn latest(&self) -> Option<u32> {
        self.samples.read().ok().and_then(|s| s.last().copied())
    }

    /// Number of samples ingested.
    pub fn len(&self) -> usize {
        self.samples.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether no samples have been ingested.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of malformed payloads dropped.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Discard all samples and reset the dropped counter.
    pub fn clear(&self) {
        if let Ok(mut samples) = self.samples.write() {
            samples.clear();
        }
        self.dropped.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_preserves_arrival_order() {
        let log = SampleLog::new();
        for count in [10u32, 20, 30] {
            log.ingest(&count.to_le_bytes());
        }
        assert_eq!(log.snapshot(), vec![10, 20, 30]);
        assert_eq!(log.latest(), Some(30));
    }

    #[test]
    fn test_malformed_payload_dropped_not_fatal() {
        let log = SampleLog::new();
        log.ingest(&5u32.to_le_bytes());
        assert_eq!(log.ingest(&[0xFF, 0x00]), None);
        log.ingest(&6u32.to_le_bytes());

        assert_eq!(log.snapshot(), vec![5, 6]);
        assert_eq!(log.dropped_count(), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let log = SampleLog::new();
        log.ingest(&1u32.to_le_bytes());
        log.ingest(&[1, 2, 3]);
        log.clear();

        assert!(log.is_empty());
        assert_eq!(log.dropped_count(), 0);
        assert_eq!(log.latest(), None);
    }

    #[test]
    fn test_ingest_from_many_threads() {
        use std::sync::Arc;

        let log = Arc::new(SampleLog::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let log = Arc::clone(&log);
            handles.push(std::thread::spawn(move || {
                for count in 0..100u32 {
                    log.ingest(&count.to_le_bytes());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 400);
    }
}
