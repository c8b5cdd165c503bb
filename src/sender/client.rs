use crate::shipper::ShipperConfig;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::{Client, ClientBuilder};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Collector unavailable: {0}")]
    Unavailable(String),
}

/// One flushed batch, ready to go on the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub request_id: u64,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in response order
    pub set_cookies: Vec<String>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            set_cookies: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookies.push(cookie.into());
        self
    }
}

/// Delivers a single request to the collector.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// reqwest-backed keep-alive connection pool pointed at one collector URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(config: &ShipperConfig) -> Result<Self, ClientError> {
        let url = config
            .endpoint_url()
            .map_err(|e| ClientError::InvalidConfiguration(e.to_string()))?;

        let client = ClientBuilder::new()
            .read_timeout(config.socket_timeout())
            .pool_max_idle_per_host(config.max_idle_sockets)
            .pool_idle_timeout(config.keep_alive_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("rask-log-shipper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(self.url.clone())
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_owned)
            .collect();

        // Body is never inspected, but it has to be consumed before the
        // connection can go back to the pool.
        response.bytes().await?;

        Ok(TransportResponse {
            status,
            set_cookies,
        })
    }
}

/// In-process transport that records every request instead of sending it.
///
/// Answers `200` unless a response or failure has been queued. Clones share
/// the same recording. [`MemoryTransport::counting`] keeps only the request
/// count, for long dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    count_only: bool,
    sent: AtomicUsize,
    requests: Mutex<Vec<OutboundRequest>>,
    scripted: Mutex<VecDeque<Result<TransportResponse, String>>>,
    latency: Mutex<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counting() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                count_only: true,
                ..MemoryInner::default()
            }),
        }
    }

    /// Delay applied to every request after it has been recorded.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = latency;
    }

    pub fn push_response(&self, response: TransportResponse) {
        self.inner.scripted.lock().push_back(Ok(response));
    }

    pub fn push_failure(&self, reason: impl Into<String>) {
        self.inner.scripted.lock().push_back(Err(reason.into()));
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.inner.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner.sent.load(Ordering::Relaxed)
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.inner.sent.fetch_add(1, Ordering::Relaxed);
        if !self.inner.count_only {
            self.inner.requests.lock().push(request);
        }

        let latency = *self.inner.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.inner.scripted.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(TransportError::Unavailable(reason)),
            None => Ok(TransportResponse::new(200)),
        }
    }
}
