use super::affinity::SessionAffinity;
use super::client::{OutboundRequest, Transport};
use super::compression::{self, Compressor};
use super::metrics::DeliveryMetrics;
use crate::buffer::Batch;
use bytes::Bytes;
use reqwest::header::{
    CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, COOKIE, HeaderMap, HeaderValue,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),
}

/// Fire-and-forget delivery of flushed batches.
///
/// Every batch becomes one spawned task: optional gzip, a wait for one of
/// `max_sockets` permits, then the request itself. Completion updates the
/// shared metrics and affinity token; failures are logged and the batch is
/// gone.
pub struct Transmitter<T: Transport> {
    transport: T,
    sockets: Semaphore,
    compress: bool,
    compressor: Compressor,
    affinity: Arc<SessionAffinity>,
    metrics: Arc<DeliveryMetrics>,
}

impl<T: Transport> Transmitter<T> {
    pub fn new(
        transport: T,
        max_sockets: usize,
        compress: bool,
        affinity: Arc<SessionAffinity>,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            transport,
            sockets: Semaphore::new(max_sockets),
            compress,
            compressor: compression::gzip,
            affinity,
            metrics,
        }
    }

    /// Replaces the gzip encoder used when compression is enabled.
    #[must_use]
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Spawns delivery of `batch` and returns immediately.
    pub fn dispatch(self: &Arc<Self>, runtime: &Handle, batch: Batch) {
        let transmitter = Arc::clone(self);
        runtime.spawn(async move {
            transmitter.deliver(batch).await;
        });
    }

    async fn deliver(&self, batch: Batch) {
        let messages = batch.len();
        let payload = batch.payload();

        let body = if self.compress {
            let plain_len = payload.len();
            match compression::compress_off_thread(self.compressor, payload).await {
                Ok(compressed) => {
                    debug!(plain_len, compressed_len = compressed.len(), "compressed batch");
                    compressed
                }
                Err(e) => {
                    self.metrics.record_dropped_batch();
                    error!(messages, error = %e, "Dropping batch after compression failure");
                    return;
                }
            }
        } else {
            payload
        };

        let request_id = self.metrics.next_request_id();
        debug!(
            request_id,
            messages,
            batch_age_ms = batch.drained_at().elapsed().as_millis() as u64,
            "batch ready"
        );
        self.post(body, request_id, self.compress).await;
    }

    /// Sends one payload and records the outcome.
    ///
    /// Nothing is returned: transport failures and non-2xx statuses are
    /// logged and counted, and a batch whose headers cannot be built is
    /// dropped the same way.
    pub async fn post(&self, payload: Bytes, request_id: u64, compressed: bool) {
        let bytes = payload.len();
        let headers = match self.build_headers(bytes, compressed) {
            Ok(headers) => headers,
            Err(e) => {
                self.metrics.record_dropped_batch();
                error!(request_id, error = %e, "Dropping batch before send");
                return;
            }
        };

        debug!(request_id, bytes, "sending batch");
        let sent_at = Instant::now();

        // The semaphore is never closed, so acquiring only ever waits.
        let Ok(_permit) = self.sockets.acquire().await else {
            self.metrics.record_dropped_batch();
            return;
        };
        let socket_at = Instant::now();
        self.metrics.record_bytes(bytes);

        let request = OutboundRequest {
            request_id,
            headers,
            body: payload,
        };

        match self.transport.send(request).await {
            Ok(response) => {
                self.metrics.record_status(response.status);
                if self.affinity.update(response.set_cookies.as_slice()) {
                    debug!(request_id, "session affinity token updated");
                }
                debug!(
                    request_id,
                    bytes,
                    status = response.status,
                    queued_ms = socket_at.duration_since(sent_at).as_millis() as u64,
                    exec_ms = socket_at.elapsed().as_millis() as u64,
                    "request done"
                );
            }
            Err(e) => {
                self.metrics.record_failed_request();
                error!(
                    request_id,
                    bytes,
                    queued_ms = socket_at.duration_since(sent_at).as_millis() as u64,
                    error = %e,
                    "Request failed, batch lost"
                );
            }
        }
    }

    pub fn build_headers(
        &self,
        content_length: usize,
        compressed: bool,
    ) -> Result<HeaderMap, TransmissionError> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        if compressed {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }

        if let Some(token) = self.affinity.token() {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&token)
                    .map_err(|e| TransmissionError::InvalidHeaderValue(format!("Invalid cookie: {e}")))?,
            );
        }

        Ok(headers)
    }

    /// Sockets currently free for new requests.
    pub fn available_sockets(&self) -> usize {
        self.sockets.available_permits()
    }
}
