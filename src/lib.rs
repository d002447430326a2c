//! # lazyzip
//!
//! List and extract remote ZIP archives over HTTP without downloading
//! them in full.
//!
//! The core is a lazy virtual file: a remote resource exposed through a
//! seekable, randomly-readable handle whose reads fetch exactly the byte
//! ranges they touch via HTTP Range requests. Fetched ranges land in a
//! local temp-file cache and are tracked so no byte is transferred twice.
//! Since ZIP archives keep their directory at the end, listing a remote
//! archive usually costs a few tail-sized requests; extraction then pulls
//! just the entries asked for. Servers without range support fall back to
//! a single full download behind the same interface.
//!
//! ## Example
//!
//! ```no_run
//! use lazyzip::{LazyOptions, open_remote};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let archive = open_remote(
//!         "https://example.com/archive.zip".to_string(),
//!         LazyOptions::default(),
//!     )
//!     .await?;
//!
//!     for entry in archive.entries().await? {
//!         println!("{}", entry.file_name);
//!     }
//!
//!     println!("fetched {} bytes", archive.reader().fetched_bytes());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod io;
pub mod lazy;
pub mod zip;

pub use cli::Cli;
pub use io::{HttpClient, LocalFile, RangeBody, RangeClient, ReadAt, RemoteMeta};
pub use lazy::{ByteRange, CoverageSet, LazyHttpFile, LazyOptions};
pub use zip::{ArchiveEntry, ZipExtractor, ZipParser, open_remote, open_remote_with};
