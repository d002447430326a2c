//! ZIP archive parsing and extraction.
//!
//! A ZIP file is read from its end: the End of Central Directory record
//! points at the Central Directory, which lists every entry without
//! touching the entry data itself. That layout is what lets a remote
//! archive be listed after fetching only its tail.
//!
//! - [`structures`]: the wire records (EOCD, ZIP64 records, headers)
//! - [`parser`]: structural parsing over any [`ReadAt`](crate::io::ReadAt)
//!   source
//! - [`extractor`]: listing and extraction (STORED and DEFLATE, with
//!   CRC-32 verification)
//! - [`remote`]: bootstrap of a lazily-fetched remote archive
//!
//! Not supported: encryption, multi-disk archives, compression methods
//! other than STORED and DEFLATE.

mod extractor;
mod parser;
mod remote;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use remote::{open_remote, open_remote_with};
pub use structures::*;
