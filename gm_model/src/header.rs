//! File-header discrimination.
//!
//! A container may start with a full `3DGM` header, a bare version word, or
//! no header at all. Classification only depends on the first four bytes
//! (plus the 12-byte length requirement for full headers).

use crate::reader::Reader;
use crate::Error;

/// `3DGM` read as a little-endian 32-bit word.
pub const MAGIC: u32 = 0x4D47_4433;

/// Inclusive range of valid bare version words.
pub const VERSION_MIN: u32 = 0x0100_0100;
pub const VERSION_MAX: u32 = 0x1000_0100;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// 12-byte header: magic, version, info.
    Full,
    /// A single version word.
    VersionOnly,
    /// Chunks start at offset 0.
    None,
}

#[derive(Copy, Clone, Debug)]
pub struct FileHeader {
    pub kind: HeaderKind,
    pub magic: u32,
    pub version: u32,
    pub info: u32,
    pub header_size: usize,
    /// Offset of the first chunk.
    pub chunk_offset: usize,
}

impl FileHeader {
    pub fn classify(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let word = r.u32_le().map_err(|_| Error::BadHeader)?;

        if word == MAGIC {
            let version = r.u32_le().map_err(|_| Error::BadHeader)?;
            let info = r.u32_le().map_err(|_| Error::BadHeader)?;

            return Ok(Self {
                kind: HeaderKind::Full,
                magic: word,
                version,
                info,
                header_size: 12,
                chunk_offset: 12,
            });
        }

        if (VERSION_MIN..=VERSION_MAX).contains(&word) {
            return Ok(Self {
                kind: HeaderKind::VersionOnly,
                magic: 0,
                version: word,
                info: 0,
                header_size: 4,
                chunk_offset: 4,
            });
        }

        Ok(Self {
            kind: HeaderKind::None,
            magic: 0,
            version: 0,
            info: 0,
            header_size: 0,
            chunk_offset: 0,
        })
    }
}
