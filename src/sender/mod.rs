pub mod affinity;
pub mod client;
pub mod compression;
pub mod metrics;
pub mod transmission;

pub use affinity::SessionAffinity;
pub use client::{
    ClientError, HttpTransport, MemoryTransport, OutboundRequest, Transport, TransportError,
    TransportResponse,
};
pub use compression::{CompressionError, Compressor};
pub use metrics::{DeliveryMetrics, DeliverySnapshot};
pub use transmission::{TransmissionError, Transmitter};
