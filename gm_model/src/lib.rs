//! Decoder for the legacy `.3GM` 3D-model container.
//!
//! A `.3GM` file is a sequence of self-describing chunks with mixed endian
//! conventions: packed big-endian vertex streams, little-endian primitive
//! streams and byte-swapped line streams. [`ShapeDecoder`] walks the chunk
//! stream and accumulates a [`Shape`] suitable for downstream export.
//!
//! ```no_run
//! use gm_model::Shape;
//!
//! let shape = Shape::from_file("model.3gm")?;
//! println!("{} vertices, {} surfaces", shape.vertex_count(), shape.surfaces().len());
//! # Ok::<(), gm_model::Error>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_crate_dependencies)]

mod header;
mod line;
mod reader;

pub mod animation;
pub mod chunk;
pub mod primitive;
pub mod shape;
pub mod surface;
pub mod vertex;

use thiserror::Error as ThisError;
use tracing::{debug, trace_span, warn};

use chunk::{Chunk, ChunkId, ChunkIter};
pub use header::{FileHeader, HeaderKind};
pub use primitive::{PrimitiveKind, PrimitiveType};
pub use reader::{complex_swap32, swap16, swap32, EofError};
pub use shape::{Limits, Shape, ShapeFlags};
pub use surface::{Surface, SurfaceStatus, SurfaceTable};

/// An error that can occur while decoding a `.3GM` file.
///
/// Where the original engine reported a numeric event code, it is preserved
/// through [`Error::event_code`].
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    UnexpectedEof(#[from] EofError),
    #[error("missing input buffer or declared size overruns bounds")]
    NullOrInvalidInput,
    #[error("surface table was never initialized")]
    SystemNotInitialized,
    #[error("surface {0} has no render data")]
    SurfaceNotReady(u16),
    #[error("surface limit of {0} reached")]
    SurfaceLimit(usize),
    #[error("surface slot {0} is already active")]
    SurfaceAllocConflict(u16),
    #[error("surface {0} is not allocated")]
    SurfaceNotAllocated(u16),
    #[error("texture id {0} outside of table bounds")]
    InvalidTexture(i16),
    #[error("polygon limit of {0} exceeded")]
    PolygonLimit(usize),
    #[error("malformed property-frame payload")]
    InvalidDynamicData,
    #[error("malformed animation payload")]
    InvalidAnimation,
    #[error("target time {target} behind global clock {global}")]
    BatchTimeOutOfRange { global: f32, target: f32 },
    #[error("animation batch index {0} out of range")]
    InvalidBatch(usize),
    #[error("invalid file header")]
    BadHeader,
    #[error("chunk stream truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("unsupported primitive type {0:#06x}")]
    UnsupportedPrimitive(u16),
    #[error("{codec} payload size {size} is invalid")]
    VertexPayload { codec: &'static str, size: usize },
    #[error("primitive stream ended mid-primitive")]
    TruncatedPrimitive,
    #[error("line stream ended mid-record")]
    TruncatedLine,
    #[error("position data size {size} does not match frame count {frames}")]
    FPosSizeMismatch { frames: u32, size: u32 },
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u16, vertex_count: u32 },
}

impl Error {
    /// The original engine's event code for this error, where one existed.
    pub fn event_code(&self) -> Option<u16> {
        match self {
            Self::NullOrInvalidInput => Some(0x6A),
            Self::SystemNotInitialized => Some(0x64),
            Self::SurfaceNotReady(_) => Some(0x960),
            Self::SurfaceLimit(_) => Some(2402),
            Self::SurfaceAllocConflict(_) => Some(2403),
            Self::SurfaceNotAllocated(_) => Some(2404),
            Self::InvalidTexture(_) => Some(800),
            Self::PolygonLimit(_) => Some(221),
            Self::InvalidDynamicData => Some(0xF4),
            Self::InvalidAnimation => Some(0xF6),
            Self::BatchTimeOutOfRange { .. } => Some(249),
            _ => None,
        }
    }
}

/// One decode session.
///
/// Owns everything the decode mutates: the shape under construction, the
/// surface table and the primitive-flag register. Nothing is process-wide,
/// so concurrent sessions never alias.
#[derive(Debug)]
pub struct ShapeDecoder {
    limits: Limits,
    surfaces: SurfaceTable,
    flag_register: u32,
    shape: Shape,
}

impl ShapeDecoder {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            surfaces: SurfaceTable::new(limits.max_textures, limits.max_surfaces),
            flag_register: 0,
            shape: Shape::new(),
        }
    }

    /// The primitive-flag register, classifying the most recently decoded
    /// primitive.
    pub fn primitive_flags(&self) -> u32 {
        self.flag_register
    }

    /// Decodes a complete file. Any error aborts the decode; partial state
    /// is discarded with the session.
    pub fn decode(mut self, buf: &[u8]) -> Result<Shape, Error> {
        let _span = trace_span!("ShapeDecoder::decode").entered();

        let header = FileHeader::classify(buf)?;
        debug!(kind = ?header.kind, version = header.version, "decoding shape");

        for chunk in ChunkIter::new(buf, header.chunk_offset) {
            let chunk = chunk?;
            if chunk.id == ChunkId::END {
                break;
            }
            self.decode_chunk(chunk)?;
        }

        self.shape.set_surfaces(self.surfaces.into_surfaces());
        self.shape.compute_bounding_box();
        self.shape.validate()?;
        Ok(self.shape)
    }

    fn decode_chunk(&mut self, chunk: Chunk<'_>) -> Result<(), Error> {
        debug!(id = %chunk.id, offset = chunk.offset, size = chunk.data.len(), "chunk");

        match chunk.id {
            // `Dot2` payloads with the 8-byte parameter block have size
            // 8 + 12n; bare triple streams have size 12n. The residues mod
            // 12 are disjoint, which selects the codec.
            ChunkId::DOT2 => {
                let decoded = if chunk.data.len() % 12 == 8 {
                    vertex::packed_to_float(chunk.data)?
                } else {
                    vertex::packed_to_float_3component(chunk.data)?
                };
                self.shape.append_vertices(decoded);
            }
            ChunkId::FDOT => {
                let decoded = vertex::decrunch_dots(chunk.data)?;
                self.shape.append_vertices(decoded);
            }
            ChunkId::PRIM => {
                primitive::decode_prim_chunk(
                    chunk.data,
                    &mut self.shape,
                    &mut self.surfaces,
                    &mut self.flag_register,
                    &self.limits,
                )?;
            }
            ChunkId::LINE => {
                line::decode_line_chunk(chunk.data, &mut self.shape, &mut self.surfaces)?;
            }
            ChunkId::SOPF => {
                self.shape.animation_mut().ingest_property_frame(chunk.data)?;
            }
            ChunkId::FPOS => {
                self.shape.animation_mut().ingest_position_frame(chunk.data)?;
            }
            ChunkId::TXNM => {
                self.shape.set_texture_names(parse_texture_names(chunk.data));
            }
            other => {
                warn!(id = %other, offset = chunk.offset, "skipping unknown chunk");
            }
        }

        Ok(())
    }
}

impl Default for ShapeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// `TxNm` payloads are a run of NUL-terminated names.
fn parse_texture_names(data: &[u8]) -> Vec<String> {
    data.split(|&b| b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_texture_names, Error};

    #[test]
    fn event_codes() {
        assert_eq!(Error::InvalidTexture(3).event_code(), Some(800));
        assert_eq!(Error::SurfaceLimit(2000).event_code(), Some(2402));
        assert_eq!(Error::SurfaceAllocConflict(1).event_code(), Some(2403));
        assert_eq!(Error::SurfaceNotAllocated(1).event_code(), Some(2404));
        assert_eq!(Error::PolygonLimit(0).event_code(), Some(221));
        assert_eq!(Error::InvalidDynamicData.event_code(), Some(0xF4));
        assert_eq!(Error::InvalidAnimation.event_code(), Some(0xF6));
        assert_eq!(Error::BadHeader.event_code(), None);
    }

    #[test]
    fn texture_name_parsing() {
        assert_eq!(
            parse_texture_names(b"hull\0deck\0\0mast\0"),
            vec!["hull", "deck", "mast"]
        );
        assert!(parse_texture_names(&[]).is_empty());
        assert!(parse_texture_names(&[0, 0]).is_empty());
    }
}
