//! File-level API over the in-memory pipeline.
//!
//! ```no_run
//! use packlab::archive::PackedFile;
//! use packlab::pipeline::UnpackOptions;
//!
//! let packed = PackedFile::open("data.packed")?;
//! let result = packed.unpack_to("data.out", &UnpackOptions::default())?;
//! assert!(result.is_verified());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::header::PackedHeader;
use crate::pipeline::{segment_headers, unpack, UnpackError, UnpackOptions, Unpacked};

/// A packed file loaded into memory.
pub struct PackedFile {
    path:  PathBuf,
    bytes: Vec<u8>,
}

impl PackedFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UnpackError> {
        let path = path.as_ref().to_owned();
        let bytes = fs::read(&path)?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self { path, bytes })
    }

    /// Wrap bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { path: PathBuf::new(), bytes }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    /// Headers of every chained segment, with their offsets.
    pub fn headers(&self) -> Result<Vec<(usize, PackedHeader)>, UnpackError> {
        segment_headers(&self.bytes)
    }

    pub fn unpack(&self, opts: &UnpackOptions) -> Result<Unpacked, UnpackError> {
        unpack(&self.bytes, opts)
    }

    /// Decode and write the result to `dest`, replacing any existing file.
    ///
    /// Nothing is written if decoding fails.
    pub fn unpack_to<P: AsRef<Path>>(
        &self,
        dest: P,
        opts: &UnpackOptions,
    ) -> Result<Unpacked, UnpackError> {
        let result = self.unpack(opts)?;
        fs::write(dest.as_ref(), &result.data)?;
        tracing::debug!("Wrote {} bytes to {}", result.data.len(), dest.as_ref().display());
        Ok(result)
    }
}
