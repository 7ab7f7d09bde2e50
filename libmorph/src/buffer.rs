//! Owned code image.
//!
//! The whole source file is held in memory as one contiguous byte vector.
//! Every other component addresses it by offset, so surgery must keep the
//! vector contiguous (erase + insert, never holes).

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Cannot access file {path:?}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type BufferResult<T> = std::result::Result<T, BufferError>;

/// Mutable byte image of an executable blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Reads the entire file into a new buffer.
    pub fn load(path: impl AsRef<Path>) -> BufferResult<Self> {
        let path = path.as_ref();

        let bytes = fs::read(path).map_err(|source| BufferError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("Loaded {} bytes from {:?}", bytes.len(), path);

        Ok(Self { bytes })
    }

    /// Writes the buffer out verbatim, replacing the file if it exists.
    pub fn save(&self, path: impl AsRef<Path>) -> BufferResult<()> {
        let path = path.as_ref();

        fs::write(path, &self.bytes).map_err(|source| BufferError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("Saved {} bytes to {:?}", self.bytes.len(), path);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }

    /// Raw access for the surgery routines.
    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");

        let original = ByteBuffer::new(vec![0x55, 0x48, 0x89, 0xE5, 0x00, 0xFF, 0xC3]);
        original.save(&path).unwrap();

        let loaded = ByteBuffer::load(&path).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(std::fs::read(&path).unwrap(), original.as_slice());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        match ByteBuffer::load(&path) {
            Err(BufferError::FileAccess { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("Expected FileAccess error, got {:?}", other),
        }
    }

    #[test]
    fn test_save_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("image.bin");

        let buffer = ByteBuffer::new(vec![0xC3]);
        assert!(matches!(
            buffer.save(&path),
            Err(BufferError::FileAccess { .. })
        ));
    }
}
