mod http;
mod local;

pub use http::HttpClient;
pub use local::LocalFile;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Size and capability information for a remote resource, obtained once
/// from a metadata probe (HEAD) and immutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct RemoteMeta {
    /// Total resource length in bytes
    pub total_length: u64,
    /// Whether the server honors `Range: bytes=...` requests
    pub supports_range: bool,
}

/// A streamed HTTP response body, consumed chunk by chunk.
#[async_trait]
pub trait RangeBody: Send {
    /// Next chunk of the body, or `None` once the body is exhausted.
    async fn chunk(&mut self) -> Result<Option<Bytes>>;
}

/// The HTTP side of a lazily-read remote resource.
///
/// Implementations supply the metadata probe and the two download shapes
/// the virtual file needs: a ranged GET for a single byte interval and a
/// plain GET for the whole resource when ranges are unsupported.
#[async_trait]
pub trait RangeClient: Send + Sync {
    /// Probe the resource for its length and range capability.
    async fn probe(&self) -> Result<RemoteMeta>;

    /// GET the inclusive byte range `[start, end]`. The server must answer
    /// with partial content; anything else is an error.
    async fn get_range(&self, start: u64, end: u64) -> Result<Box<dyn RangeBody>>;

    /// GET the entire resource, for servers without range support.
    async fn get_all(&self) -> Result<Box<dyn RangeBody>>;

    /// Identity of the resource, used as the virtual file's name.
    fn url(&self) -> &str;
}
