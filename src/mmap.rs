//! File mapping for database files.
//!
//! The rest of the reader only ever sees a contiguous, immutable byte range.
//! [`MappedFile`] is that capability; [`MmapFile`] provides it by memory
//! mapping the file read-only, [`OwnedBuffer`] by holding the bytes in memory
//! (for databases read eagerly or built in tests).
//!
//! # Example
//!
//! ```no_run
//! use mmdb_reader::mmap::{MappedFile, MmapFile};
//!
//! let file = MmapFile::open("GeoLite2-Country.mmdb")?;
//! println!("Size: {} bytes", file.len());
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```

use crate::error::{MmdbError, Result};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::path::Path;

/// A read-only byte range backing an open database.
///
/// Implementations must return the same bytes for the whole lifetime of the
/// value.
pub trait MappedFile: Send + Sync {
    /// The full contents
    fn as_slice(&self) -> &[u8];

    /// Length in bytes
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// True for a zero-length file
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A memory-mapped database file.
///
/// The mapping is released when the value is dropped.
pub struct MmapFile {
    mmap: Mmap,
}

impl MmapFile {
    /// Open and memory-map a file read-only.
    ///
    /// # Errors
    ///
    /// Returns [`MmdbError::FileOpen`] if the file cannot be opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_open = |source| MmdbError::FileOpen {
            path: path.display().to_string(),
            source,
        };

        let file = File::open(path).map_err(file_open)?;
        // SAFETY: the mapping is read-only and databases are never modified
        // while a session has them open.
        let mmap = unsafe { Mmap::map(&file) }.map_err(file_open)?;
        Ok(MmapFile { mmap })
    }
}

impl MappedFile for MmapFile {
    fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }
}

impl fmt::Debug for MmapFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapFile")
            .field("size", &self.mmap.len())
            .finish()
    }
}

/// Database bytes held in memory.
#[derive(Clone)]
pub struct OwnedBuffer {
    bytes: Vec<u8>,
}

impl OwnedBuffer {
    /// Wrap an existing buffer
    pub fn new(bytes: Vec<u8>) -> Self {
        OwnedBuffer { bytes }
    }

    /// Read a whole file into memory.
    ///
    /// # Errors
    ///
    /// Returns [`MmdbError::FileOpen`] if the file cannot be read.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| MmdbError::FileOpen {
            path: path.display().to_string(),
            source,
        })?;
        Ok(OwnedBuffer { bytes })
    }
}

impl MappedFile for OwnedBuffer {
    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for OwnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedBuffer")
            .field("size", &self.bytes.len())
            .finish()
    }
}
