use bytes::{BufMut, Bytes, BytesMut};
use std::time::Instant;

/// Messages drained from the buffer in a single flush, in submission order.
#[derive(Debug, Clone)]
pub struct Batch {
    messages: Vec<String>,
    drained_at: Instant,
}

impl Batch {
    pub fn new(messages: Vec<String>) -> Self {
        Self {
            messages,
            drained_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }

    pub fn drained_at(&self) -> Instant {
        self.drained_at
    }

    /// Renders the request body: every message followed by a newline.
    ///
    /// Embedded line breaks are passed through untouched, so a message that
    /// contains one will read as two records on the receiving side.
    pub fn payload(&self) -> Bytes {
        let capacity = self.messages.iter().map(|m| m.len() + 1).sum();
        let mut buf = BytesMut::with_capacity(capacity);
        for message in &self.messages {
            buf.put_slice(message.as_bytes());
            buf.put_u8(b'\n');
        }
        buf.freeze()
    }
}

/// Pending messages plus the size threshold that triggers an early flush.
#[derive(Debug)]
pub struct BatchBuffer {
    pending: Vec<String>,
    threshold: usize,
}

impl BatchBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: Vec::new(),
            threshold,
        }
    }

    /// Appends a message and reports whether the threshold has been reached.
    pub fn push(&mut self, message: String) -> bool {
        self.pending.push(message);
        self.pending.len() >= self.threshold
    }

    /// Swaps in a fresh buffer and hands back everything accumulated so far.
    ///
    /// The threshold is a flush trigger, not a capacity hint; timer-only
    /// configurations set it to `usize::MAX`.
    pub fn drain(&mut self) -> Batch {
        Batch::new(std::mem::take(&mut self.pending))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_reports_threshold() {
        let mut buffer = BatchBuffer::new(3);
        assert!(!buffer.push("a".to_string()));
        assert!(!buffer.push("b".to_string()));
        assert!(buffer.push("c".to_string()));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_drain_swaps_in_empty_buffer() {
        let mut buffer = BatchBuffer::new(10);
        buffer.push("first".to_string());
        buffer.push("second".to_string());

        let batch = buffer.drain();
        assert_eq!(batch.messages(), &["first".to_string(), "second".to_string()]);
        assert!(buffer.is_empty());

        buffer.push("third".to_string());
        let next = buffer.drain();
        assert_eq!(next.into_messages(), vec!["third".to_string()]);
    }

    #[test]
    fn test_unbounded_threshold_allocates_lazily() {
        let mut buffer = BatchBuffer::new(usize::MAX);
        assert_eq!(buffer.threshold(), usize::MAX);
        assert!(!buffer.push("only".to_string()));

        let batch = buffer.drain();
        assert_eq!(batch.len(), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.pending.capacity(), 0);
    }

    #[test]
    fn test_drain_empty_buffer() {
        let mut buffer = BatchBuffer::new(5);
        let batch = buffer.drain();
        assert!(batch.is_empty());
        assert!(batch.payload().is_empty());
    }

    #[test]
    fn test_payload_is_newline_terminated_in_order() {
        let batch = Batch::new(vec![
            "one".to_string(),
            "two".to_string(),
            "three".to_string(),
        ]);
        assert_eq!(&batch.payload()[..], b"one\ntwo\nthree\n");
    }

    #[test]
    fn test_payload_keeps_embedded_newlines_and_utf8() {
        let batch = Batch::new(vec!["line\nbreak".to_string(), "日本語".to_string()]);
        let payload = batch.payload();
        assert_eq!(std::str::from_utf8(&payload).unwrap(), "line\nbreak\n日本語\n");
    }
}
