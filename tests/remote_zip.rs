//! End-to-end tests: a remote ZIP archive served by an in-memory
//! transport, opened through the lazy virtual file.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Bytes;
use flate2::Compression;
use flate2::write::DeflateEncoder;

use lazyzip::{LazyOptions, RangeBody, RangeClient, RemoteMeta, open_remote_with};

// ---------------------------------------------------------------------------
// In-memory transport

/// Serves a byte buffer over the `RangeClient` interface, counting
/// requests so tests can assert on what actually went over the wire.
struct FakeServer {
    data: Vec<u8>,
    supports_range: bool,
    range_requests: AtomicUsize,
    full_requests: AtomicUsize,
}

impl FakeServer {
    fn new(data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            data,
            supports_range: true,
            range_requests: AtomicUsize::new(0),
            full_requests: AtomicUsize::new(0),
        })
    }

    fn without_range_support(data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            data,
            supports_range: false,
            range_requests: AtomicUsize::new(0),
            full_requests: AtomicUsize::new(0),
        })
    }

    fn range_requests(&self) -> usize {
        self.range_requests.load(Ordering::Relaxed)
    }

    fn full_requests(&self) -> usize {
        self.full_requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RangeClient for FakeServer {
    async fn probe(&self) -> Result<RemoteMeta> {
        Ok(RemoteMeta {
            total_length: self.data.len() as u64,
            supports_range: self.supports_range,
        })
    }

    async fn get_range(&self, start: u64, end: u64) -> Result<Box<dyn RangeBody>> {
        if !self.supports_range {
            bail!("range requests not supported");
        }
        if start > end || end >= self.data.len() as u64 {
            bail!("requested range {start}-{end} not satisfiable");
        }
        self.range_requests.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FixedBody::new(
            self.data[start as usize..=end as usize].to_vec(),
        )))
    }

    async fn get_all(&self) -> Result<Box<dyn RangeBody>> {
        self.full_requests.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FixedBody::new(self.data.clone())))
    }

    fn url(&self) -> &str {
        "fake://archive.zip"
    }
}

struct FixedBody {
    data: Vec<u8>,
    pos: usize,
}

impl FixedBody {
    fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

#[async_trait]
impl RangeBody for FixedBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        // Small chunks so multi-chunk streaming paths are exercised.
        let end = (self.pos + 53).min(self.data.len());
        let chunk = Bytes::copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(Some(chunk))
    }
}

// ---------------------------------------------------------------------------
// ZIP fixtures

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

struct FixtureEntry {
    name: String,
    data: Vec<u8>,
    method: u16,
}

/// Builds a well-formed single-disk ZIP archive in memory.
struct ZipFixture {
    entries: Vec<FixtureEntry>,
    comment: Vec<u8>,
}

impl ZipFixture {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            comment: Vec::new(),
        }
    }

    fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_string(),
            data: data.to_vec(),
            method: METHOD_STORED,
        });
        self
    }

    fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_string(),
            data: data.to_vec(),
            method: METHOD_DEFLATE,
        });
        self
    }

    fn comment(mut self, text: &[u8]) -> Self {
        self.comment = text.to_vec();
        self
    }

    fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        let count = self.entries.len() as u16;

        for entry in &self.entries {
            let lfh_offset = out.len() as u32;

            let mut crc = flate2::Crc::new();
            crc.update(&entry.data);
            let crc32 = crc.sum();

            let payload = match entry.method {
                METHOD_STORED => entry.data.clone(),
                METHOD_DEFLATE => {
                    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
                    enc.write_all(&entry.data).unwrap();
                    enc.finish().unwrap()
                }
                other => panic!("fixture does not support method {other}"),
            };

            // Local file header
            out.extend_from_slice(b"PK\x03\x04");
            out.write_u16::<LittleEndian>(20).unwrap(); // version needed
            out.write_u16::<LittleEndian>(0).unwrap(); // flags
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0x6000).unwrap(); // mod time
            out.write_u16::<LittleEndian>(0x58CF).unwrap(); // mod date
            out.write_u32::<LittleEndian>(crc32).unwrap();
            out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap(); // extra len
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&payload);

            // Matching central directory header
            central.extend_from_slice(b"PK\x01\x02");
            central.write_u16::<LittleEndian>(20).unwrap(); // version made by
            central.write_u16::<LittleEndian>(20).unwrap(); // version needed
            central.write_u16::<LittleEndian>(0).unwrap(); // flags
            central.write_u16::<LittleEndian>(entry.method).unwrap();
            central.write_u16::<LittleEndian>(0x6000).unwrap();
            central.write_u16::<LittleEndian>(0x58CF).unwrap();
            central.write_u32::<LittleEndian>(crc32).unwrap();
            central.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
            central
                .write_u32::<LittleEndian>(entry.data.len() as u32)
                .unwrap();
            central
                .write_u16::<LittleEndian>(entry.name.len() as u16)
                .unwrap();
            central.write_u16::<LittleEndian>(0).unwrap(); // extra len
            central.write_u16::<LittleEndian>(0).unwrap(); // comment len
            central.write_u16::<LittleEndian>(0).unwrap(); // disk start
            central.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
            central.write_u32::<LittleEndian>(0).unwrap(); // external attrs
            central.write_u32::<LittleEndian>(lfh_offset).unwrap();
            central.extend_from_slice(entry.name.as_bytes());
        }

        let cd_offset = out.len() as u32;
        let cd_size = central.len() as u32;
        out.extend_from_slice(&central);

        // End of central directory
        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap(); // disk number
        out.write_u16::<LittleEndian>(0).unwrap(); // disk with cd
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16)
            .unwrap();
        out.extend_from_slice(&self.comment);

        out
    }
}

fn bulky(byte: u8, len: usize) -> Vec<u8> {
    vec![byte; len]
}

// ---------------------------------------------------------------------------
// Tests

#[tokio::test]
async fn listing_fetches_only_the_tail() {
    let archive = ZipFixture::new()
        .stored("a.bin", &bulky(1, 20_000))
        .stored("b.bin", &bulky(2, 20_000))
        .stored("c/d.bin", &bulky(3, 20_000))
        .build();
    let total = archive.len() as u64;

    let server = FakeServer::new(archive);
    let extractor = open_remote_with(server.clone(), LazyOptions::default())
        .await
        .unwrap();

    let entries = extractor.entries().await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(names, ["a.bin", "b.bin", "c/d.bin"]);

    // The archive is ~60 KB; the directory lives in the last 10 KB window.
    let fetched = extractor.reader().fetched_bytes();
    assert!(fetched <= 10 * 1024, "fetched {fetched} of {total}");
    assert_eq!(server.range_requests(), 1);

    // Listing again is served entirely from cache.
    extractor.entries().await.unwrap();
    assert_eq!(server.range_requests(), 1);
    assert_eq!(extractor.reader().fetched_bytes(), fetched);
}

#[tokio::test]
async fn extracts_stored_and_deflated_entries() {
    let text: Vec<u8> = (0..8192u32).map(|i| (i * 31 % 253) as u8).collect();
    let archive = ZipFixture::new()
        .stored("padding.bin", &bulky(0xEE, 30_000))
        .stored("stored.dat", &text)
        .deflated("packed.dat", &text)
        .build();

    let server = FakeServer::new(archive);
    let extractor = open_remote_with(server.clone(), LazyOptions::default())
        .await
        .unwrap();

    let entries = extractor.entries().await.unwrap();
    let stored = entries.iter().find(|e| e.file_name == "stored.dat").unwrap();
    let packed = entries.iter().find(|e| e.file_name == "packed.dat").unwrap();

    assert_eq!(extractor.read_entry(stored).await.unwrap(), text);
    assert_eq!(extractor.read_entry(packed).await.unwrap(), text);
    assert!(packed.compressed_size < packed.uncompressed_size);

    // Re-extracting hits only the cache.
    let requests = server.range_requests();
    extractor.read_entry(stored).await.unwrap();
    extractor.read_entry(packed).await.unwrap();
    assert_eq!(server.range_requests(), requests);
}

#[tokio::test]
async fn sequential_read_matches_served_bytes() {
    let archive = ZipFixture::new()
        .stored("x.bin", &bulky(7, 12_345))
        .deflated("y.bin", &bulky(8, 23_456))
        .build();

    let server = FakeServer::new(archive.clone());
    let extractor = open_remote_with(server, LazyOptions::default())
        .await
        .unwrap();

    // Walk the virtual file from the start, regardless of what probing
    // already fetched out of order.
    let file = extractor.reader();
    let mut out = Vec::new();
    let mut buf = [0u8; 1013];
    loop {
        let n = file.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, archive);
    assert_eq!(file.fetched_bytes(), archive.len() as u64);
}

#[tokio::test]
async fn no_range_support_downloads_everything_once() {
    let archive = ZipFixture::new()
        .stored("one.txt", b"hello")
        .deflated("two.txt", &bulky(b'x', 5000))
        .build();
    let total = archive.len() as u64;

    let server = FakeServer::without_range_support(archive);
    let extractor = open_remote_with(server.clone(), LazyOptions::default())
        .await
        .unwrap();

    assert_eq!(server.full_requests(), 1);
    assert_eq!(server.range_requests(), 0);
    assert_eq!(extractor.reader().fetched_bytes(), total);

    let entries = extractor.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(extractor.read_entry(&entries[0]).await.unwrap(), b"hello");

    // Nothing further goes over the wire.
    assert_eq!(server.full_requests(), 1);
    assert_eq!(server.range_requests(), 0);
}

#[tokio::test]
async fn archive_comment_is_searched_through() {
    let archive = ZipFixture::new()
        .stored("file.txt", b"data under a commented archive")
        .comment(b"built by a tool that loves trailing commentary")
        .build();

    let server = FakeServer::new(archive);
    let extractor = open_remote_with(server, LazyOptions::default())
        .await
        .unwrap();

    let entries = extractor.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        extractor.read_entry(&entries[0]).await.unwrap(),
        b"data under a commented archive"
    );
}

#[tokio::test]
async fn empty_archive_lists_no_entries() {
    let archive = ZipFixture::new().build();
    assert_eq!(archive.len(), 22);

    let server = FakeServer::new(archive);
    let extractor = open_remote_with(server, LazyOptions::default())
        .await
        .unwrap();
    assert!(extractor.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_archive_fails_after_exhausting_windows() {
    // 4 KB of bytes that never contain a ZIP signature.
    let junk = vec![0x55u8; 4096];
    let server = FakeServer::new(junk.clone());

    let err = open_remote_with(server.clone(), LazyOptions { chunk_size: 1024 })
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("not a valid ZIP archive"),
        "unexpected error: {err:#}"
    );

    // Probing marched all the way back; every byte was fetched exactly once.
    assert!(server.range_requests() >= 2);
    assert!(server.range_requests() <= junk.len() / 1024 + 1);
}

#[tokio::test]
async fn corrupt_directory_offset_is_rejected() {
    let mut archive = ZipFixture::new().stored("a.txt", b"abc").build();
    // Point the central directory far outside the archive.
    let eocd = archive.len() - 22;
    archive[eocd + 16..eocd + 20].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());

    let server = FakeServer::new(archive);
    let err = open_remote_with(server, LazyOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a valid ZIP archive"));
}
