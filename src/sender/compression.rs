use bytes::Bytes;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("gzip encoding failed: {0}")]
    Encode(#[source] std::io::Error),
    #[error("gzip decoding failed: {0}")]
    Decode(#[source] std::io::Error),
    #[error("compression task failed: {0}")]
    Task(String),
}

/// Body encoder applied to a rendered batch before it is posted.
pub type Compressor = fn(&[u8]) -> Result<Bytes, CompressionError>;

pub fn gzip(data: &[u8]) -> Result<Bytes, CompressionError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(CompressionError::Encode)?;
    let compressed = encoder.finish().map_err(CompressionError::Encode)?;
    Ok(Bytes::from(compressed))
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder.read_to_end(&mut out).map_err(CompressionError::Decode)?;
    Ok(out)
}

/// Runs `compressor` on the blocking pool so the dispatch task's worker
/// stays free.
pub async fn compress_off_thread(
    compressor: Compressor,
    data: Bytes,
) -> Result<Bytes, CompressionError> {
    tokio::task::spawn_blocking(move || compressor(&data))
        .await
        .map_err(|e| CompressionError::Task(e.to_string()))?
}

pub async fn gzip_off_thread(data: Bytes) -> Result<Bytes, CompressionError> {
    compress_off_thread(gzip, data).await
}
