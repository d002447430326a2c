//! Fixed-capacity on-disk byte store backing the virtual file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use anyhow::{Result, bail};

/// A local random-access byte store of exactly `len` bytes.
///
/// Backed by an anonymous temp file (unlinked at creation, so the bytes
/// are reclaimed by the OS on every exit path) and pre-sized once; the
/// capacity never changes afterwards.
///
/// Positional [`write_at`](Self::write_at)/[`read_at`](Self::read_at) do
/// not move the logical cursor: internal range downloads can land bytes
/// anywhere without disturbing the consumer's read position, which only
/// [`seek`](Self::seek) and sequential reads through the owner advance.
///
/// Regions that were never written read back as zeros; the owner must
/// guarantee coverage before exposing any region to a consumer.
pub struct CacheFile {
    file: File,
    len: u64,
    pos: u64,
}

impl CacheFile {
    /// Create the store pre-sized to `len` bytes.
    pub fn with_len(len: u64) -> Result<Self> {
        let file = tempfile::tempfile()?;
        file.set_len(len)?;
        Ok(Self { file, len, pos: 0 })
    }

    /// Fixed capacity in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write `data` at `offset`. The written span must lie inside the
    /// fixed capacity; the logical cursor is left untouched.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.len {
            bail!(
                "write of {} bytes at offset {offset} exceeds cache capacity {}",
                data.len(),
                self.len
            );
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Read up to `buf.len()` bytes at `offset` without moving the logical
    /// cursor. Returns fewer bytes than requested only when the read spans
    /// the end of the store; an offset beyond the capacity is an error.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset > self.len {
            bail!("read at offset {offset} beyond cache capacity {}", self.len);
        }
        let count = (buf.len() as u64).min(self.len - offset) as usize;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf[..count])?;
        Ok(count)
    }

    /// Three-mode seek of the logical cursor. The resulting position must
    /// stay within `[0, len]`.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
            SeekFrom::End(delta) => self.len as i128 + delta as i128,
        };
        if target < 0 || target > self.len as i128 {
            bail!("seek to {target} outside cache of {} bytes", self.len);
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    /// Current logical cursor position.
    pub fn tell(&self) -> u64 {
        self.pos
    }
}
