use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;

use super::RangeReader;
use crate::error::IoError;

/// Local-file implementation of RangeReader.
///
/// The file size is captured once on open. Each read seeks and reads under a
/// mutex, so the handle is released when the reader is dropped on any path.
#[derive(Debug)]
pub struct FileRangeReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open a file for range reads.
    ///
    /// Returns `IoError::NotFound` if the path does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = format!("file://{}", path.display());

        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => IoError::NotFound(path.display().to_string()),
            _ => IoError::from(e),
        })?;
        let size = file.metadata()?.len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier,
        })
    }
}

impl RangeReader for FileRangeReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let in_bounds = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
