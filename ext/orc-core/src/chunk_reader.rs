//! Random-access inputs for the file reader
//!
//! A [`ChunkReader`] hands out byte ranges of an ORC file. Implementations
//! are shared between threads, so every call is independent of the others.

use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::{ErrorContext, Result};

/// Total length of an input
pub trait Length {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Input the reader can fetch arbitrary byte ranges from
pub trait ChunkReader: Length + Send + Sync {
    /// Read exactly `length` bytes starting at `start`
    fn get_bytes(&self, start: u64, length: usize) -> Result<Bytes>;
}

/// File-based chunk reader that opens the file for each read
///
/// Holding only the path keeps the reader `Sync`, so stripes can be fetched
/// from several threads at once.
#[derive(Debug, Clone)]
pub struct FileChunkReader {
    path: PathBuf,
    file_len: u64,
}

impl FileChunkReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let metadata = file.metadata()?;
        let file_len = metadata.len();

        Ok(FileChunkReader { path, file_len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Length for FileChunkReader {
    fn len(&self) -> u64 {
        self.file_len
    }
}

impl ChunkReader for FileChunkReader {
    fn get_bytes(&self, start: u64, length: usize) -> Result<Bytes> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;

        let mut buf = vec![0; length];
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

impl Length for Bytes {
    fn len(&self) -> u64 {
        Bytes::len(self) as u64
    }
}

impl ChunkReader for Bytes {
    fn get_bytes(&self, start: u64, length: usize) -> Result<Bytes> {
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        match start.checked_add(length) {
            Some(end) if end <= Bytes::len(self) => Ok(self.slice(start..end)),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "range {}+{} is outside of a {} byte buffer",
                    start,
                    length,
                    Bytes::len(self)
                ),
            )
            .into()),
        }
    }
}
