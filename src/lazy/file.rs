use std::io::SeekFrom;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::cache::CacheFile;
use super::coverage::{ByteRange, CoverageSet};
use crate::io::{RangeClient, ReadAt, RemoteMeta};
use anyhow::{Result, bail};

/// Tuning knobs for a [`LazyHttpFile`].
#[derive(Debug, Clone, Copy)]
pub struct LazyOptions {
    /// Stride of the backward probing windows.
    pub chunk_size: u64,
}

impl Default for LazyOptions {
    fn default() -> Self {
        Self {
            chunk_size: 10 * 1024,
        }
    }
}

/// A remote resource exposed as a local, seekable, randomly-readable file.
///
/// Bytes are fetched over HTTP range requests only when a read touches
/// them, landed in a temp-file cache, and tracked in a [`CoverageSet`] so
/// no byte is ever fetched twice. When the server does not support range
/// requests the whole resource is downloaded once at open time instead.
///
/// The cursor API (`read`/`seek`/`tell`) makes the file a drop-in
/// replacement for a local file handle; the [`ReadAt`] impl lets the ZIP
/// parser consume it positionally without disturbing that cursor.
pub struct LazyHttpFile {
    client: Arc<dyn RangeClient>,
    meta: RemoteMeta,
    options: LazyOptions,
    /// Bytes actually pulled over the network so far.
    fetched_bytes: AtomicU64,
    state: Mutex<State>,
}

/// Cache, coverage and cursor, guarded together: a download must not
/// interleave with a competing read of the same region.
struct State {
    cache: CacheFile,
    coverage: CoverageSet,
}

impl LazyHttpFile {
    /// Probe the remote resource and set up the backing cache.
    ///
    /// If the server lacks range support the entire resource is downloaded
    /// here, in a single fetch. Otherwise no payload bytes are transferred
    /// yet; see [`probe_structure`](super::probe::probe_structure) for the
    /// structural bootstrap.
    pub async fn open(client: Arc<dyn RangeClient>, options: LazyOptions) -> Result<Self> {
        let meta = client.probe().await?;
        let cache = CacheFile::with_len(meta.total_length)?;
        let file = Self {
            client,
            meta,
            options,
            fetched_bytes: AtomicU64::new(0),
            state: Mutex::new(State {
                cache,
                coverage: CoverageSet::new(),
            }),
        };

        if !meta.supports_range {
            debug!(url = %file.client.url(), "no range support, downloading whole resource");
            file.download_all().await?;
        }

        Ok(file)
    }

    /// Resource identity (the URL).
    pub fn name(&self) -> &str {
        self.client.url()
    }

    /// Total length of the remote resource in bytes.
    pub fn len(&self) -> u64 {
        self.meta.total_length
    }

    pub fn is_empty(&self) -> bool {
        self.meta.total_length == 0
    }

    /// Whether the server honors range requests.
    pub fn supports_range(&self) -> bool {
        self.meta.supports_range
    }

    /// Backward probing stride.
    pub fn chunk_size(&self) -> u64 {
        self.options.chunk_size
    }

    /// Bytes transferred from the network so far.
    pub fn fetched_bytes(&self) -> u64 {
        self.fetched_bytes.load(Ordering::Relaxed)
    }

    /// Read from the cursor into `buf`, advancing the cursor.
    ///
    /// Returns fewer bytes than `buf.len()` only when the read reaches the
    /// end of the resource. Missing ranges are downloaded first.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock().await;
        let start = state.cache.tell();
        let stop = (start + buf.len() as u64).min(self.meta.total_length);
        if start >= stop {
            return Ok(0);
        }

        self.ensure_covered(&mut state, start, stop - 1).await?;
        let n = state.cache.read_at(start, &mut buf[..(stop - start) as usize])?;
        state.cache.seek(SeekFrom::Start(start + n as u64))?;
        Ok(n)
    }

    /// Read everything from the cursor to the end of the resource.
    pub async fn read_to_end(&self) -> Result<Vec<u8>> {
        let mut state = self.state.lock().await;
        let start = state.cache.tell();
        let stop = self.meta.total_length;
        if start >= stop {
            return Ok(Vec::new());
        }

        self.ensure_covered(&mut state, start, stop - 1).await?;
        let mut buf = vec![0u8; (stop - start) as usize];
        let n = state.cache.read_at(start, &mut buf)?;
        buf.truncate(n);
        state.cache.seek(SeekFrom::Start(start + n as u64))?;
        Ok(buf)
    }

    /// Three-mode seek. Never triggers a download.
    pub async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.state.lock().await.cache.seek(pos)
    }

    /// Current cursor position.
    pub async fn tell(&self) -> u64 {
        self.state.lock().await.cache.tell()
    }

    /// Make sure `[window_start, len - 1]` is present in the cache,
    /// fetching only the parts no earlier request already covered.
    pub async fn fetch_tail(&self, window_start: u64) -> Result<()> {
        if self.meta.total_length == 0 {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        self.ensure_covered(&mut state, window_start, self.meta.total_length - 1)
            .await
    }

    /// Download whatever parts of `[start, end]` are still missing.
    async fn ensure_covered(&self, state: &mut State, start: u64, end: u64) -> Result<()> {
        for gap in state.coverage.gaps(start, end) {
            self.download(state, gap).await?;
        }
        Ok(())
    }

    /// Fetch one gap with a single range request, streaming the body into
    /// the cache. Coverage is recorded only after the last byte is on
    /// disk, so a failed transfer leaves the set untouched for this gap.
    async fn download(&self, state: &mut State, gap: ByteRange) -> Result<()> {
        trace!(start = gap.start, end = gap.end, "downloading gap");

        let mut body = self.client.get_range(gap.start, gap.end).await?;
        let mut offset = gap.start;
        while let Some(chunk) = body.chunk().await? {
            if offset + chunk.len() as u64 > gap.end + 1 {
                bail!(
                    "server sent more than the requested range {}-{}",
                    gap.start,
                    gap.end
                );
            }
            state.cache.write_at(offset, &chunk)?;
            offset += chunk.len() as u64;
        }
        if offset != gap.end + 1 {
            bail!(
                "short response for range {}-{}: body ended at offset {offset}",
                gap.start,
                gap.end
            );
        }

        state.coverage.insert(gap.start, gap.end);
        self.fetched_bytes.fetch_add(gap.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Full-resource download for servers without range support.
    async fn download_all(&self) -> Result<()> {
        let total = self.meta.total_length;
        if total == 0 {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let mut body = self.client.get_all().await?;
        let mut offset = 0u64;
        while let Some(chunk) = body.chunk().await? {
            if offset + chunk.len() as u64 > total {
                bail!("server sent more than the advertised {total} bytes");
            }
            state.cache.write_at(offset, &chunk)?;
            offset += chunk.len() as u64;
        }
        if offset != total {
            bail!("short full download: got {offset} of {total} bytes");
        }

        state.coverage.insert(0, total - 1);
        self.fetched_bytes.fetch_add(total, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl ReadAt for LazyHttpFile {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset > self.meta.total_length {
            bail!(
                "read at offset {offset} beyond resource length {}",
                self.meta.total_length
            );
        }
        let end = (offset + buf.len() as u64).min(self.meta.total_length);
        if offset >= end {
            return Ok(0);
        }

        let mut state = self.state.lock().await;
        self.ensure_covered(&mut state, offset, end - 1).await?;
        state.cache.read_at(offset, &mut buf[..(end - offset) as usize])
    }

    fn size(&self) -> u64 {
        self.meta.total_length
    }
}
