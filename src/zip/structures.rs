use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::Result;

/// Structural parse failure: the bytes do not form a valid ZIP archive.
///
/// Distinct from transport errors on purpose. While the remote file is
/// being probed this condition means "not enough trailing bytes yet" and
/// drives another, wider probe window; only once the whole resource is
/// local does it become fatal.
#[derive(Debug, thiserror::Error)]
#[error("not a valid ZIP archive: {0}")]
pub struct InvalidArchive(pub &'static str);

// Record parsing reads from bounds-checked in-memory buffers, so an I/O
// error there can only be an unexpected end of a record.
impl From<std::io::Error> for InvalidArchive {
    fn from(_: std::io::Error) -> Self {
        InvalidArchive("truncated record")
    }
}

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(InvalidArchive("bad end of central directory record").into());
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Any field at its sentinel value means the real value lives in the
    /// ZIP64 end of central directory.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EocdLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EocdLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(InvalidArchive("bad ZIP64 locator").into());
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64Eocd {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64Eocd {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(InvalidArchive("bad ZIP64 end of central directory").into());
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// One entry of the archive, parsed from its central directory header.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ArchiveEntry {
    /// Modification date from the DOS date field, as (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Modification time from the DOS time field, as (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eocd_rejects_short_or_unsigned_input() {
        assert!(EndOfCentralDirectory::from_bytes(b"PK\x05\x06").is_err());
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        buf[0..4].copy_from_slice(b"PK\x01\x02");
        let err = EndOfCentralDirectory::from_bytes(&buf).unwrap_err();
        assert!(err.downcast_ref::<InvalidArchive>().is_some());
    }

    #[test]
    fn eocd_parses_fields() {
        let mut buf = Vec::new();
        buf.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        buf.extend_from_slice(&0u16.to_le_bytes()); // disk number
        buf.extend_from_slice(&0u16.to_le_bytes()); // disk with cd
        buf.extend_from_slice(&3u16.to_le_bytes()); // disk entries
        buf.extend_from_slice(&3u16.to_le_bytes()); // total entries
        buf.extend_from_slice(&146u32.to_le_bytes()); // cd size
        buf.extend_from_slice(&512u32.to_le_bytes()); // cd offset
        buf.extend_from_slice(&0u16.to_le_bytes()); // comment len

        let eocd = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 146);
        assert_eq!(eocd.cd_offset, 512);
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn zip64_sentinels_are_detected() {
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        buf[0..4].copy_from_slice(EndOfCentralDirectory::SIGNATURE);
        buf[16..20].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes()); // cd offset
        let eocd = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert!(eocd.is_zip64());
    }

    #[test]
    fn dos_timestamps_decode() {
        let entry = ArchiveEntry {
            file_name: "a".into(),
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            // 2024-03-15 10:30:00
            last_mod_date: ((2024 - 1980) << 9) | (3 << 5) | 15,
            last_mod_time: (10 << 11) | (30 << 5),
            is_directory: false,
        };
        assert_eq!(entry.mod_date(), (2024, 3, 15));
        assert_eq!(entry.mod_time(), (10, 30, 0));
    }
}
