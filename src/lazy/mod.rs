//! A lazy, randomly-readable virtual file backed by HTTP range requests.
//!
//! [`LazyHttpFile`] makes a remote archive look like a local seekable
//! file: each read fetches exactly the byte ranges it is missing, caches
//! them in a temp file, and serves every later overlapping read from that
//! cache. [`probe_structure`] bootstraps the trailing bytes an archive
//! parser needs without downloading the rest, falling back to a full
//! download when the server cannot serve ranges.

mod cache;
mod coverage;
mod file;
mod probe;

pub use cache::CacheFile;
pub use coverage::{ByteRange, CoverageSet};
pub use file::{LazyHttpFile, LazyOptions};
pub use probe::{StructuralCheck, probe_structure};
