use super::ReadAt;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Local file reader with random access support
pub struct LocalFile {
    file: std::fs::File,
    size: u64,
    #[cfg(not(unix))]
    lock: std::sync::Mutex<()>,
}

impl LocalFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            #[cfg(not(unix))]
            lock: std::sync::Mutex::new(()),
        })
    }
}

#[async_trait]
impl ReadAt for LocalFile {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            // pread may return short; fill the buffer until EOF.
            let mut filled = 0;
            while filled < buf.len() {
                match self.file.read_at(&mut buf[filled..], offset + filled as u64)? {
                    0 => break,
                    n => filled += n,
                }
            }
            Ok(filled)
        }

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            // No pread available: serialize seek+read pairs on the shared handle.
            let _guard = self.lock.lock().expect("local file lock poisoned");
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            let mut filled = 0;
            while filled < buf.len() {
                match file.read(&mut buf[filled..])? {
                    0 => break,
                    n => filled += n,
                }
            }
            Ok(filled)
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}
