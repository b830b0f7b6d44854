//! Positioned file access for the storage engine
//!
//! Read-write files use seek + read/write. Read-only files are memory
//! mapped when the `mmap` feature is enabled.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::{Mmap, MmapOptions};
use omx_core::{OmxError, Result};

fn io_error(what: &str, path: &Path, err: std::io::Error) -> OmxError {
    OmxError::Resource(format!("{what} '{}': {err}", path.display()))
}

/// Physical storage behind an open store file
pub(crate) enum Backing {
    Writable(File),
    ReadOnly(File),
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
}

impl Backing {
    /// Open an existing file for reading
    pub(crate) fn open_read_only(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| io_error("failed to open", path, e))?;

        #[cfg(feature = "mmap")]
        {
            // Empty files cannot be mapped on every platform
            let len = file.metadata().map(|m| m.len()).unwrap_or(0);
            if len == 0 {
                return Ok(Backing::ReadOnly(file));
            }

            // SAFETY: Read-only mapping; single-writer access is a documented requirement
            let mmap = unsafe { MmapOptions::new().map(&file) }
                .map_err(|e| io_error("failed to memory map", path, e))?;
            Ok(Backing::Mapped(mmap))
        }

        #[cfg(not(feature = "mmap"))]
        Ok(Backing::ReadOnly(file))
    }

    /// Open an existing file for reading and writing
    pub(crate) fn open_read_write(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| io_error("failed to open", path, e))?;
        Ok(Backing::Writable(file))
    }

    /// Create a file, destroying any previous content
    pub(crate) fn create_truncated(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| io_error("failed to create", path, e))?;
        Ok(Backing::Writable(file))
    }

    pub(crate) fn is_writable(&self) -> bool {
        matches!(self, Backing::Writable(_))
    }

    /// Physical size in bytes
    pub(crate) fn len(&self) -> Result<u64> {
        match self {
            Backing::Writable(file) | Backing::ReadOnly(file) => file
                .metadata()
                .map(|m| m.len())
                .map_err(|e| OmxError::Resource(format!("failed to query file size: {e}"))),
            #[cfg(feature = "mmap")]
            Backing::Mapped(mmap) => Ok(mmap.len() as u64),
        }
    }

    /// Read exactly `len` bytes at `offset`
    pub(crate) fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        match self {
            Backing::Writable(file) | Backing::ReadOnly(file) => {
                let mut buf = vec![0u8; len];
                file.seek(SeekFrom::Start(offset))
                    .and_then(|_| file.read_exact(&mut buf))
                    .map_err(|e| {
                        OmxError::Resource(format!("failed to read {len} bytes at {offset}: {e}"))
                    })?;
                Ok(buf)
            }
            #[cfg(feature = "mmap")]
            Backing::Mapped(mmap) => {
                let start = usize::try_from(offset)
                    .map_err(|_| OmxError::Format("offset beyond addressable range".into()))?;
                let end = start
                    .checked_add(len)
                    .filter(|&end| end <= mmap.len())
                    .ok_or_else(|| {
                        OmxError::Format(format!("region at {offset} extends beyond file"))
                    })?;
                Ok(mmap[start..end].to_vec())
            }
        }
    }

    /// Write `bytes` at `offset`
    pub(crate) fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        match self {
            Backing::Writable(file) => file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| file.write_all(bytes))
                .map_err(|e| {
                    OmxError::Resource(format!(
                        "failed to write {} bytes at {offset}: {e}",
                        bytes.len()
                    ))
                }),
            _ => Err(OmxError::State("file is open read-only".into())),
        }
    }

    /// Cut the file at `len` bytes and sync it to disk
    pub(crate) fn truncate_and_sync(&mut self, len: u64) -> Result<()> {
        match self {
            Backing::Writable(file) => file
                .set_len(len)
                .and_then(|_| file.sync_all())
                .map_err(|e| OmxError::Resource(format!("failed to sync file: {e}"))),
            _ => Err(OmxError::State("file is open read-only".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positioned_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("io.bin");

        let mut backing = Backing::create_truncated(&path).unwrap();
        assert!(backing.is_writable());
        backing.write_at(0, b"head").unwrap();
        backing.write_at(10, b"tail").unwrap();
        assert_eq!(backing.len().unwrap(), 14);
        assert_eq!(backing.read_at(10, 4).unwrap(), b"tail");

        backing.truncate_and_sync(4).unwrap();
        drop(backing);

        let mut backing = Backing::open_read_only(&path).unwrap();
        assert!(!backing.is_writable());
        assert_eq!(backing.read_at(0, 4).unwrap(), b"head");
        assert!(backing.read_at(2, 4).is_err());
        assert!(backing.write_at(0, b"x").is_err());
    }
}
