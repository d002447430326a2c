use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::io::ReadAt;
use anyhow::{Result, bail};
use flate2::Crc;
use flate2::read::DeflateDecoder;

use super::parser::ZipParser;
use super::structures::{ArchiveEntry, CompressionMethod};

/// High-level extraction API over any random-access archive source.
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> std::fmt::Debug for ZipExtractor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipExtractor").finish_non_exhaustive()
    }
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// All entries of the archive, from the central directory.
    pub async fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        self.parser.entries().await
    }

    /// The underlying archive source.
    pub fn reader(&self) -> &Arc<R> {
        self.parser.reader()
    }

    /// Decompress an entry into memory, verifying its CRC-32.
    pub async fn read_entry(&self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.data_offset(entry).await?;

        let mut compressed = vec![0u8; entry.compressed_size as usize];
        let n = self
            .parser
            .reader()
            .read_at(data_offset, &mut compressed)
            .await?;
        if (n as u64) < entry.compressed_size {
            bail!(
                "archive truncated: {} of {} bytes for {}",
                n,
                entry.compressed_size,
                entry.file_name
            );
        }

        let data = match entry.compression_method {
            CompressionMethod::Stored => compressed,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(&compressed[..]).read_to_end(&mut out)?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!(
                    "unsupported compression method {method} for {}",
                    entry.file_name
                );
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "decompressed size mismatch for {}: expected {}, got {}",
                entry.file_name,
                entry.uncompressed_size,
                data.len()
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!("CRC mismatch for {}", entry.file_name);
        }

        Ok(data)
    }

    /// Extract an entry to disk, creating parent directories as needed.
    pub async fn extract_to_file(&self, entry: &ArchiveEntry, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let data = self.read_entry(entry).await?;

        let mut file = fs::File::create(output_path).await?;
        file.write_all(&data).await?;

        Ok(())
    }

    /// Extract an entry to stdout.
    pub async fn extract_to_stdout(&self, entry: &ArchiveEntry) -> Result<()> {
        let data = self.read_entry(entry).await?;

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&data).await?;

        Ok(())
    }
}
