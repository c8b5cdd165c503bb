pub mod config;

pub use config::{ConfigError, ShipperConfig};

use crate::buffer::{BatchBuffer, FlushTimer};
use crate::sender::compression;
use crate::sender::{
    ClientError, Compressor, DeliveryMetrics, DeliverySnapshot, HttpTransport, SessionAffinity,
    Transmitter, Transport,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ShipperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Threshold,
    Interval,
    Manual,
    Shutdown,
}

/// Batching log sender for a single collector endpoint.
///
/// `submit` only appends to an in-memory buffer. A batch is flushed once
/// `max_messages` are pending or `flush_interval_ms` has passed since the
/// previous flush, whichever comes first. Each flush becomes one POST that
/// runs in the background; its outcome is visible only through the logs and
/// [`LogShipper::metrics`].
///
/// Must be constructed inside a tokio runtime. After that `submit` may be
/// called from any thread.
pub struct LogShipper<T: Transport = HttpTransport> {
    inner: Arc<ShipperInner<T>>,
}

struct ShipperInner<T: Transport> {
    config: ShipperConfig,
    runtime: Handle,
    state: Mutex<IngestState>,
    transmitter: Arc<Transmitter<T>>,
    metrics: Arc<DeliveryMetrics>,
}

struct IngestState {
    buffer: BatchBuffer,
    timer: FlushTimer,
    stopped: bool,
}

impl LogShipper<HttpTransport> {
    pub fn new(config: ShipperConfig) -> Result<Self, ShipperError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> LogShipper<T> {
    pub fn with_transport(config: ShipperConfig, transport: T) -> Result<Self, ShipperError> {
        Self::assemble(config, transport, compression::gzip)
    }

    fn assemble(
        config: ShipperConfig,
        transport: T,
        compressor: Compressor,
    ) -> Result<Self, ShipperError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| ShipperError::NoRuntime(e.to_string()))?;

        let metrics = Arc::new(DeliveryMetrics::new());
        let affinity = Arc::new(SessionAffinity::new(config.cookies));
        let transmitter = Arc::new(
            Transmitter::new(
                transport,
                config.max_sockets,
                config.gzip,
                affinity,
                Arc::clone(&metrics),
            )
            .with_compressor(compressor),
        );

        let state = IngestState {
            buffer: BatchBuffer::new(config.max_messages),
            timer: FlushTimer::new(runtime.clone()),
            stopped: false,
        };

        let inner = Arc::new(ShipperInner {
            config,
            runtime,
            state: Mutex::new(state),
            transmitter,
            metrics,
        });

        inner.arm_timer(&mut inner.state.lock());

        let config = &inner.config;
        info!(
            host = %config.host,
            path = %config.path,
            gzip = config.gzip,
            cookies = config.cookies,
            max_messages = config.max_messages,
            flush_interval_ms = config.flush_interval_ms,
            max_sockets = config.max_sockets,
            "log shipper started"
        );

        Ok(Self { inner })
    }

    /// Queues one log line. Never blocks on the network.
    ///
    /// Reaching `max_messages` flushes synchronously before returning.
    pub fn submit(&self, message: impl Into<String>) {
        let mut state = self.inner.state.lock();
        if state.stopped {
            warn!("message submitted after shutdown, dropping it");
            return;
        }

        if state.buffer.push(message.into()) {
            debug!(
                pending = state.buffer.len(),
                threshold = state.buffer.threshold(),
                "buffer full"
            );
            self.inner.flush_locked(&mut state, FlushTrigger::Threshold);
        }
    }

    /// Flushes whatever is pending right now and restarts the interval.
    pub fn flush(&self) {
        let mut state = self.inner.state.lock();
        self.inner.flush_locked(&mut state, FlushTrigger::Manual);
    }

    /// Stops the interval timer for good, optionally flushing one last time.
    ///
    /// Requests already in flight are neither awaited nor cancelled.
    pub fn shutdown(&self, flush_first: bool) {
        let mut state = self.inner.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;

        if flush_first {
            self.inner.flush_locked(&mut state, FlushTrigger::Shutdown);
        } else if !state.buffer.is_empty() {
            warn!(discarded = state.buffer.len(), "shutting down without flushing pending messages");
        }
        state.timer.cancel();

        info!(
            messages_sent = self.inner.metrics.messages_sent(),
            requests_issued = self.inner.metrics.requests_issued(),
            "log shipper stopped"
        );
    }

    /// Messages drained into dispatched batches so far.
    pub fn message_count(&self) -> u64 {
        self.inner.metrics.messages_sent()
    }

    /// Completed responses per HTTP status code.
    pub fn status_codes(&self) -> BTreeMap<u16, u64> {
        self.inner.metrics.status_codes()
    }

    pub fn metrics(&self) -> DeliverySnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    pub fn config(&self) -> &ShipperConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &T {
        self.inner.transmitter.transport()
    }
}

impl<T: Transport> ShipperInner<T> {
    /// Cancel the timer, hand the drained batch to the transmitter, rearm.
    ///
    /// Called with the state lock held, including from inside `submit`.
    fn flush_locked(self: &Arc<Self>, state: &mut IngestState, trigger: FlushTrigger) {
        state.timer.cancel();

        if !state.buffer.is_empty() {
            let batch = state.buffer.drain();
            debug!(messages = batch.len(), ?trigger, "flushing batch");
            self.metrics.record_drained(batch.len());
            self.transmitter.dispatch(&self.runtime, batch);
        }

        if !state.stopped {
            self.arm_timer(state);
        }
    }

    fn arm_timer(self: &Arc<Self>, state: &mut IngestState) {
        let weak = Arc::downgrade(self);
        state.timer.arm(self.config.flush_interval(), move |generation| {
            if let Some(inner) = weak.upgrade() {
                inner.on_timer(generation);
            }
        });
    }

    fn on_timer(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        // A size-triggered flush may have rearmed while this timer was waking up.
        if !state.timer.is_current(generation) {
            debug!(
                stale = generation,
                current = state.timer.generation(),
                "ignoring superseded flush timer"
            );
            return;
        }
        self.flush_locked(&mut state, FlushTrigger::Interval);
    }
}
