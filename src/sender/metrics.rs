use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySnapshot {
    pub messages_sent: u64,
    pub requests_issued: u64,
    pub bytes_sent: u64,
    pub failed_requests: u64,
    pub dropped_batches: u64,
    pub status_codes: BTreeMap<u16, u64>,
}

/// Monotonic delivery counters shared between the flush path and the
/// response continuations. Diagnostic only.
#[derive(Debug)]
pub struct DeliveryMetrics {
    messages_sent: AtomicU64,
    next_request_id: AtomicU64,
    bytes_sent: AtomicU64,
    failed_requests: AtomicU64,
    dropped_batches: AtomicU64,
    status_codes: Mutex<BTreeMap<u16, u64>>,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            next_request_id: AtomicU64::new(1),
            bytes_sent: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            dropped_batches: AtomicU64::new(0),
            status_codes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Counted when a batch is drained, whatever happens to its request.
    pub fn record_drained(&self, messages: usize) {
        self.messages_sent
            .fetch_add(messages as u64, Ordering::Relaxed);
    }

    /// Allocates the next request sequence number, starting at 1.
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn record_bytes(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_status(&self, status: u16) {
        *self.status_codes.lock().entry(status).or_insert(0) += 1;
    }

    pub fn record_failed_request(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_batch(&self) {
        self.dropped_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn requests_issued(&self) -> u64 {
        self.next_request_id.load(Ordering::Relaxed) - 1
    }

    pub fn status_codes(&self) -> BTreeMap<u16, u64> {
        self.status_codes.lock().clone()
    }

    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            messages_sent: self.messages_sent(),
            requests_issued: self.requests_issued(),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            dropped_batches: self.dropped_batches.load(Ordering::Relaxed),
            status_codes: self.status_codes(),
        }
    }
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_start_at_one() {
        let metrics = DeliveryMetrics::new();
        assert_eq!(metrics.requests_issued(), 0);
        assert_eq!(metrics.next_request_id(), 1);
        assert_eq!(metrics.next_request_id(), 2);
        assert_eq!(metrics.requests_issued(), 2);
    }

    #[test]
    fn test_status_histogram_accumulates() {
        let metrics = DeliveryMetrics::new();
        metrics.record_status(200);
        metrics.record_status(200);
        metrics.record_status(503);

        let codes = metrics.status_codes();
        assert_eq!(codes.get(&200), Some(&2));
        assert_eq!(codes.get(&503), Some(&1));
        assert_eq!(codes.len(), 2);
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = DeliveryMetrics::new();
        metrics.record_drained(7);
        metrics.record_bytes(128);
        metrics.record_failed_request();
        metrics.record_dropped_batch();
        metrics.next_request_id();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_sent, 7);
        assert_eq!(snapshot.requests_issued, 1);
        assert_eq!(snapshot.bytes_sent, 128);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.dropped_batches, 1);
        assert!(snapshot.status_codes.is_empty());
    }
}
