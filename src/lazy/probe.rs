//! Backward structural probing of an unknown-format remote resource.
//!
//! Archive formats such as ZIP keep their directory at the end of the
//! file, but its size is not known up front. The prober fetches a window
//! at the tail of the resource, asks the format parser whether it can make
//! sense of the file, and widens the window backwards in fixed strides
//! until the parse succeeds or the whole resource has been covered.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::file::LazyHttpFile;
use anyhow::Result;

/// The structural parser the prober drives, e.g. a ZIP central-directory
/// reader. The parser only sees the virtual file; reads it performs fetch
/// missing ranges on demand.
#[async_trait]
pub trait StructuralCheck: Send + Sync {
    /// Attempt a structural parse against the partially downloaded file.
    async fn check(&self, file: &Arc<LazyHttpFile>) -> Result<()>;

    /// Whether `err` means "not enough trailing bytes yet" rather than a
    /// hard failure such as a transport error.
    fn is_recoverable(&self, err: &anyhow::Error) -> bool;
}

/// Outcome of one validation attempt.
enum Attempt {
    Parsed,
    NeedMoreBytes(anyhow::Error),
    Fatal(anyhow::Error),
}

async fn attempt(file: &Arc<LazyHttpFile>, check: &dyn StructuralCheck) -> Attempt {
    match check.check(file).await {
        Ok(()) => Attempt::Parsed,
        Err(e) if check.is_recoverable(&e) => Attempt::NeedMoreBytes(e),
        Err(e) => Attempt::Fatal(e),
    }
}

/// Bootstrap enough trailing bytes of `file` for `check` to succeed.
///
/// Windows `[window_start, len - 1]` march backwards from the end of the
/// resource in strides of the file's chunk size; bytes fetched by an
/// earlier window are never fetched again. A recoverable parse failure
/// with the window already at offset 0 means the resource can never
/// validate and yields that parse error.
///
/// For servers without range support the whole resource was downloaded at
/// open time, so a single validation decides.
pub async fn probe_structure(file: &Arc<LazyHttpFile>, check: &dyn StructuralCheck) -> Result<()> {
    if !file.supports_range() {
        return match attempt(file, check).await {
            Attempt::Parsed => Ok(()),
            Attempt::NeedMoreBytes(e) | Attempt::Fatal(e) => Err(e),
        };
    }

    let stride = file.chunk_size();
    let mut window_start = file.len().saturating_sub(stride);
    loop {
        file.fetch_tail(window_start).await?;

        match attempt(file, check).await {
            Attempt::Parsed => {
                debug!(window_start, fetched = file.fetched_bytes(), "structural probe succeeded");
                return Ok(());
            }
            Attempt::NeedMoreBytes(e) => {
                if window_start == 0 {
                    // The whole resource is local and still does not parse.
                    return Err(e);
                }
                debug!(window_start, "structural parse incomplete, widening window");
                window_start = window_start.saturating_sub(stride);
            }
            Attempt::Fatal(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RangeClient;
    use crate::lazy::file::LazyOptions;
    use crate::lazy::testutil::FakeClient;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Check that fails `failures` times with a recoverable error, then
    /// succeeds. Records the windows it observed.
    struct FlakyCheck {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyCheck {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StructuralCheck for FlakyCheck {
        async fn check(&self, _file: &Arc<LazyHttpFile>) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            if n < self.failures {
                Err(anyhow!("incomplete"))
            } else {
                Ok(())
            }
        }

        fn is_recoverable(&self, err: &anyhow::Error) -> bool {
            err.to_string() == "incomplete"
        }
    }

    struct FatalCheck;

    #[async_trait]
    impl StructuralCheck for FatalCheck {
        async fn check(&self, _file: &Arc<LazyHttpFile>) -> Result<()> {
            Err(anyhow!("broken pipe"))
        }

        fn is_recoverable(&self, _err: &anyhow::Error) -> bool {
            false
        }
    }

    async fn open_with_stride(len: usize, chunk_size: u64) -> (Arc<FakeClient>, Arc<LazyHttpFile>) {
        let client = Arc::new(FakeClient::new(vec![0xAB; len]));
        let file = LazyHttpFile::open(client.clone() as Arc<dyn RangeClient>, LazyOptions { chunk_size })
            .await
            .unwrap();
        (client, Arc::new(file))
    }

    #[tokio::test]
    async fn first_window_success_fetches_one_stride() {
        let (client, file) = open_with_stride(1000, 100).await;
        probe_structure(&file, &FlakyCheck::new(0)).await.unwrap();
        assert_eq!(client.range_requests(), 1);
        assert_eq!(file.fetched_bytes(), 100);
    }

    #[tokio::test]
    async fn windows_march_backwards_without_refetching() {
        // Footer "needs" 3 windows: two recoverable failures, then success.
        let (client, file) = open_with_stride(1000, 100).await;
        probe_structure(&file, &FlakyCheck::new(2)).await.unwrap();
        // One range request per window, each fetching only the new stride.
        assert_eq!(client.range_requests(), 3);
        assert_eq!(file.fetched_bytes(), 300);
    }

    #[tokio::test]
    async fn exhausted_windows_surface_the_parse_error() {
        let (client, file) = open_with_stride(250, 100).await;
        // Windows start at 150, 50, 0: three attempts, none succeed.
        let err = probe_structure(&file, &FlakyCheck::new(usize::MAX))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "incomplete");
        assert_eq!(client.range_requests(), 3);
        assert_eq!(file.fetched_bytes(), 250);
    }

    #[tokio::test]
    async fn fatal_errors_stop_probing_immediately() {
        let (client, file) = open_with_stride(1000, 100).await;
        let err = probe_structure(&file, &FatalCheck).await.unwrap_err();
        assert_eq!(err.to_string(), "broken pipe");
        assert_eq!(client.range_requests(), 1);
    }

    #[tokio::test]
    async fn no_range_support_validates_once() {
        let client = Arc::new(FakeClient::new(vec![0u8; 500]).without_range_support());
        let file = Arc::new(
            LazyHttpFile::open(client.clone() as Arc<dyn RangeClient>, LazyOptions::default())
                .await
                .unwrap(),
        );

        probe_structure(&file, &FlakyCheck::new(0)).await.unwrap();
        assert_eq!(client.full_requests(), 1);
        assert_eq!(client.range_requests(), 0);

        // And a recoverable failure is fatal here: there is nothing left
        // to fetch.
        let err = probe_structure(&file, &FlakyCheck::new(usize::MAX))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "incomplete");
    }
}
