//! Opening a remote ZIP archive through the lazy virtual file.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::io::{HttpClient, RangeClient};
use crate::lazy::{LazyHttpFile, LazyOptions, StructuralCheck, probe_structure};
use anyhow::Result;

use super::extractor::ZipExtractor;
use super::parser::ZipParser;
use super::structures::InvalidArchive;

/// The ZIP structural check driven by the prober: a full central
/// directory listing against the virtual file. Reads it performs pull in
/// whatever ranges they touch, so on success the directory is cached and
/// later listings are free.
struct CentralDirectoryCheck;

#[async_trait]
impl StructuralCheck for CentralDirectoryCheck {
    async fn check(&self, file: &Arc<LazyHttpFile>) -> Result<()> {
        ZipParser::new(file.clone()).entries().await.map(drop)
    }

    fn is_recoverable(&self, err: &anyhow::Error) -> bool {
        err.chain()
            .any(|cause| cause.downcast_ref::<InvalidArchive>().is_some())
    }
}

/// Open a remote ZIP archive over HTTP, downloading only what is needed.
///
/// Probes the server, bootstraps the trailing structure (or falls back to
/// a full download when ranges are unsupported) and returns an extractor
/// whose reads keep fetching lazily.
pub async fn open_remote(url: String, options: LazyOptions) -> Result<ZipExtractor<LazyHttpFile>> {
    let client: Arc<dyn RangeClient> = Arc::new(HttpClient::new(url)?);
    open_remote_with(client, options).await
}

/// [`open_remote`] over an arbitrary transport.
pub async fn open_remote_with(
    client: Arc<dyn RangeClient>,
    options: LazyOptions,
) -> Result<ZipExtractor<LazyHttpFile>> {
    let file = Arc::new(LazyHttpFile::open(client, options).await?);
    probe_structure(&file, &CentralDirectoryCheck).await?;
    debug!(
        name = file.name(),
        fetched = file.fetched_bytes(),
        total = file.len(),
        "remote archive ready"
    );
    Ok(ZipExtractor::new(file))
}
