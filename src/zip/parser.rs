//! Low-level ZIP central directory parser.
//!
//! ZIP archives are read from the end: locate the End of Central Directory
//! record, follow it (via the ZIP64 records when present) to the central
//! directory, and walk the directory entries. Only the tail of the archive
//! is ever touched, which is what makes lazily-fetched remote sources
//! practical.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// Bounds the backward search for an EOCD that is preceded by a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Parser for the structural records of a ZIP archive.
///
/// Generic over [`ReadAt`] so the same code runs against local files and
/// the lazy HTTP-backed virtual file. Structural failures surface as
/// [`InvalidArchive`]; I/O and transport failures keep their own types.
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Locate and parse the End of Central Directory record.
    ///
    /// Tries the fixed position for comment-less archives first, then
    /// searches backwards through the maximum comment span. Returns the
    /// record and its absolute offset.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(InvalidArchive("too small to hold an end of central directory").into());
        }

        // Fast path: EOCD flush with the end of the file, no comment.
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        // A trailing comment pushes the EOCD inward; search backwards over
        // the longest span a comment can occupy.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_at(search_start, &mut buf).await?;

        for i in (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // A real EOCD's comment length accounts exactly for the
                // bytes that remain after the record.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd =
                        EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(InvalidArchive("no end of central directory record").into())
    }

    /// Resolve the 64-bit central directory fields for ZIP64 archives.
    ///
    /// The locator sits immediately before the regular EOCD and points at
    /// the ZIP64 EOCD record.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64Eocd> {
        if eocd_offset < Zip64EocdLocator::SIZE as u64 {
            return Err(InvalidArchive("no room for a ZIP64 locator").into());
        }

        let locator_offset = eocd_offset - Zip64EocdLocator::SIZE as u64;
        let mut locator_buf = vec![0u8; Zip64EocdLocator::SIZE];
        self.reader
            .read_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EocdLocator::from_bytes(&locator_buf)?;
        if locator.eocd64_offset >= self.size {
            return Err(InvalidArchive("ZIP64 locator points outside the archive").into());
        }

        let mut eocd64_buf = vec![0u8; Zip64Eocd::MIN_SIZE];
        self.reader
            .read_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64Eocd::from_bytes(&eocd64_buf)
    }

    /// Read the central directory and return every entry of the archive.
    pub async fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset
            .checked_add(cd_size)
            .is_none_or(|end| end > self.size)
        {
            return Err(InvalidArchive("central directory lies outside the archive").into());
        }

        // One read covers the whole directory, so a remote source needs at
        // most one range request for it.
        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(total_entries.min(u16::MAX as u64) as usize);
        let mut cursor = Cursor::new(&cd_data[..]);

        for _ in 0..total_entries {
            entries.push(self.parse_cdfh(&mut cursor)?);
        }

        Ok(entries)
    }

    /// Parse one Central Directory File Header at the cursor.
    fn parse_cdfh(
        &self,
        cursor: &mut Cursor<&[u8]>,
    ) -> std::result::Result<ArchiveEntry, InvalidArchive> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(InvalidArchive("bad central directory file header"));
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        // Lossy conversion keeps non-UTF8 names usable for display.
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();
        let is_directory = file_name.ends_with('/');

        // ZIP64 extended information (extra field id 0x0001) replaces any
        // 32-bit field that hit its sentinel value.
        let extra_field_end = cursor.position() + extra_field_length as u64;
        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()?;

            if header_id == 0x0001 {
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
                break;
            }
            cursor.set_position(cursor.position() + field_size as u64);
        }
        cursor.set_position(extra_field_end);

        // Skip the per-entry comment.
        cursor.set_position(cursor.position() + file_comment_length as u64);

        Ok(ArchiveEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            is_directory,
        })
    }

    /// Absolute offset of an entry's file data.
    ///
    /// The local file header repeats the variable-length name and extra
    /// field with lengths that may differ from the central directory, so
    /// it has to be read to find where the payload begins.
    pub async fn data_offset(&self, entry: &ArchiveEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader
            .read_at(entry.lfh_offset, &mut lfh_buf)
            .await
            .with_context(|| format!("reading local header of {}", entry.file_name))?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(InvalidArchive("bad local file header").into());
        }

        let mut cursor = Cursor::new(&lfh_buf[26..]);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}
