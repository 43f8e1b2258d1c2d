//! Primitive types and the `Prim` chunk decoder.
//!
//! A `Prim` payload is a sequence of 16-bit tokens: a primitive-type token,
//! then the primitive's data, repeating until the end marker. Counted kinds
//! carry `[count, index * count]`; a complex primitive carries exactly
//! [`COMPLEX_DATA_WORDS`] data words.

use crate::reader::Reader;
use crate::shape::{Limits, Shape, ShapeFlags};
use crate::surface::SurfaceTable;
use crate::Error;

/// Raw 16-bit primitive-type value as it appears in the stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveType(pub u16);

impl PrimitiveType {
    pub const TRIANGLE_STRIP: Self = Self(16646);
    /// Input-only alias, rewritten to [`Self::QUAD_STRIP`] on read.
    pub const QUAD_STRIP_INPUT: Self = Self(18189);
    pub const QUAD_STRIP: Self = Self(18190);
    pub const TRIANGLE_LIST: Self = Self(20486);
    pub const POINT_SPRITE: Self = Self(21251);
    pub const LINE_STRIP: Self = Self(28422);
    /// Input-only alias, rewritten to [`Self::POINT_SPRITE`] on read.
    pub const LINE_STRIP_ALT: Self = Self(28423);
    pub const COMPLEX: Self = Self(30733);

    /// Applies the in-stream type rewrites.
    pub fn rewrite(self) -> Self {
        match self {
            Self::QUAD_STRIP_INPUT => Self::QUAD_STRIP,
            Self::LINE_STRIP_ALT => Self::POINT_SPRITE,
            other => other,
        }
    }

    /// The primitive-flag register value this type produces.
    pub fn flag_register(self) -> u32 {
        match self {
            Self::TRIANGLE_STRIP | Self::TRIANGLE_LIST => 0x0001_0001,
            Self::QUAD_STRIP => 0x0000_0201,
            Self::POINT_SPRITE => 0x0000_0001,
            Self::LINE_STRIP | Self::COMPLEX => 0x0000_0101,
            _ => 0,
        }
    }

    pub fn kind(self) -> Option<PrimitiveKind> {
        match self {
            Self::TRIANGLE_STRIP => Some(PrimitiveKind::TriangleStrip),
            Self::QUAD_STRIP => Some(PrimitiveKind::QuadStrip),
            Self::TRIANGLE_LIST => Some(PrimitiveKind::TriangleList),
            Self::POINT_SPRITE => Some(PrimitiveKind::PointSprite),
            Self::LINE_STRIP => Some(PrimitiveKind::LineStrip),
            Self::COMPLEX => Some(PrimitiveKind::Complex),
            _ => None,
        }
    }
}

/// Ends primitive processing.
pub const END_MARKER: u16 = 0x6000;
/// Ends a primitive list within the stream.
pub const LIST_TERMINATOR: u16 = 0xFFFE;
/// Ends a line-data run inside `Line` chunks.
pub const LINE_DATA_END: u16 = 0x7000;

/// Data words following a [`PrimitiveType::COMPLEX`] type token.
pub const COMPLEX_DATA_WORDS: usize = 10;

/// Primitive kinds exposed to downstream consumers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Triangle,
    TriangleStrip,
    QuadStrip,
    LineStrip,
    PointSprite,
    TriangleList,
    Complex,
}

/// Expands `indices` into triangle-list order, appending to `out`.
/// Returns the number of triangles emitted.
fn expand_topology(kind: PrimitiveKind, indices: &[u16], out: &mut Vec<u16>) -> Result<u32, Error> {
    let n = indices.len();

    match kind {
        PrimitiveKind::TriangleStrip => {
            if n < 3 {
                return Ok(0);
            }
            for i in 0..n - 2 {
                if i % 2 == 0 {
                    out.extend_from_slice(&[indices[i], indices[i + 1], indices[i + 2]]);
                } else {
                    // Odd strip positions flip winding by swapping in the
                    // trailing-edge vertex.
                    out.extend_from_slice(&[indices[i], indices[i - 1], indices[i + 2]]);
                }
            }
            Ok((n - 2) as u32)
        }
        PrimitiveKind::Triangle | PrimitiveKind::TriangleList => {
            if n % 3 != 0 {
                return Err(Error::TruncatedPrimitive);
            }
            out.extend_from_slice(indices);
            Ok((n / 3) as u32)
        }
        PrimitiveKind::QuadStrip => {
            if n % 4 != 0 {
                return Err(Error::TruncatedPrimitive);
            }
            for quad in indices.chunks_exact(4) {
                let [a, b, c, d] = [quad[0], quad[1], quad[2], quad[3]];
                out.extend_from_slice(&[a, b, c, a, c, d]);
            }
            Ok((n / 4 * 2) as u32)
        }
        // Degenerate kinds pass through without expansion.
        PrimitiveKind::LineStrip | PrimitiveKind::PointSprite | PrimitiveKind::Complex => Ok(0),
    }
}

fn read_counted_indices(r: &mut Reader<'_>) -> Result<Vec<u16>, Error> {
    let count = r.u16_le().map_err(|_| Error::TruncatedPrimitive)?;
    let mut indices = Vec::with_capacity(count.into());
    for _ in 0..count {
        indices.push(r.u16_le().map_err(|_| Error::TruncatedPrimitive)?);
    }
    Ok(indices)
}

pub(crate) fn decode_prim_chunk(
    data: &[u8],
    shape: &mut Shape,
    surfaces: &mut SurfaceTable,
    flag_register: &mut u32,
    limits: &Limits,
) -> Result<(), Error> {
    let mut r = Reader::new(data);

    loop {
        let token = r.u16_le().map_err(|_| Error::TruncatedPrimitive)?;
        if token == END_MARKER {
            break;
        }
        if token == LIST_TERMINATOR {
            continue;
        }

        let ty = PrimitiveType(token).rewrite();
        let Some(kind) = ty.kind() else {
            return Err(Error::UnsupportedPrimitive(token));
        };
        *flag_register = ty.flag_register();

        let surface_id = surfaces.get_or_create_surface(ty.0, shape.texture_id(), 0)?;

        match kind {
            PrimitiveKind::Complex => {
                let mut words = [0u32; COMPLEX_DATA_WORDS];
                for word in &mut words {
                    *word = r.u16_le().map_err(|_| Error::TruncatedPrimitive)?.into();
                }

                let surface = surfaces.surface_mut(surface_id)?;
                surface.primitive_data.extend_from_slice(&words);
                surface.primitive_count += 1;
            }
            PrimitiveKind::LineStrip | PrimitiveKind::PointSprite => {
                // Degenerate kinds keep their raw indices.
                let indices = read_counted_indices(&mut r)?;
                let surface = surfaces.surface_mut(surface_id)?;
                surface.indices.extend_from_slice(&indices);
                surface.primitive_count += 1;
            }
            _ => {
                let indices = read_counted_indices(&mut r)?;

                let buffer = shape.primitive_buffer_mut();
                let index_offset = buffer.len() as u32;
                let mut expanded = Vec::new();
                let triangles = expand_topology(kind, &indices, &mut expanded)?;
                buffer.extend_from_slice(&expanded);

                if buffer.len() / 3 > limits.max_polygons {
                    return Err(Error::PolygonLimit(limits.max_polygons));
                }

                let surface = surfaces.surface_mut(surface_id)?;
                if surface.primitive_count == 0 {
                    surface.index_offset = index_offset;
                }
                surface.indices.extend_from_slice(&expanded);
                // An under-full strip still counts as a primitive so the
                // surface never ends up empty.
                surface.primitive_count += triangles.max(1);
            }
        }
    }

    shape.insert_flags(ShapeFlags::PRIM_GEOMETRY);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        decode_prim_chunk, expand_topology, PrimitiveKind, PrimitiveType, END_MARKER,
        LIST_TERMINATOR,
    };
    use crate::shape::{Limits, Shape, ShapeFlags};
    use crate::surface::SurfaceTable;
    use crate::Error;

    fn tokens(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn decode(words: &[u16]) -> Result<(Shape, SurfaceTable, u32), Error> {
        let mut shape = Shape::new();
        let mut surfaces = SurfaceTable::new(1000, 2000);
        let mut register = 0;
        decode_prim_chunk(
            &tokens(words),
            &mut shape,
            &mut surfaces,
            &mut register,
            &Limits::default(),
        )?;
        Ok((shape, surfaces, register))
    }

    #[test]
    fn rewrites() {
        assert_eq!(
            PrimitiveType::QUAD_STRIP_INPUT.rewrite(),
            PrimitiveType::QUAD_STRIP
        );
        assert_eq!(
            PrimitiveType::LINE_STRIP_ALT.rewrite(),
            PrimitiveType::POINT_SPRITE
        );
        assert_eq!(
            PrimitiveType::TRIANGLE_STRIP.rewrite(),
            PrimitiveType::TRIANGLE_STRIP
        );
    }

    #[test]
    fn flag_register_table() {
        assert_eq!(PrimitiveType::TRIANGLE_STRIP.flag_register(), 0x0001_0001);
        assert_eq!(PrimitiveType::TRIANGLE_LIST.flag_register(), 0x0001_0001);
        assert_eq!(PrimitiveType::QUAD_STRIP.flag_register(), 0x0000_0201);
        assert_eq!(PrimitiveType::POINT_SPRITE.flag_register(), 0x0000_0001);
        assert_eq!(PrimitiveType::LINE_STRIP.flag_register(), 0x0000_0101);
        assert_eq!(PrimitiveType::COMPLEX.flag_register(), 0x0000_0101);
        assert_eq!(PrimitiveType(0x1234).flag_register(), 0);
    }

    #[test]
    fn strip_expansion_flips_odd_windings() {
        let mut out = Vec::new();
        let count =
            expand_topology(PrimitiveKind::TriangleStrip, &[0, 1, 2, 3], &mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(out, vec![0, 1, 2, 1, 0, 3]);
    }

    #[test]
    fn strip_too_short_emits_nothing() {
        let mut out = Vec::new();
        assert_eq!(
            expand_topology(PrimitiveKind::TriangleStrip, &[0, 1], &mut out).unwrap(),
            0
        );
        assert!(out.is_empty());
    }

    #[test]
    fn list_roundtrips_verbatim() {
        let indices = [3, 1, 2, 0, 2, 1, 5, 4, 3];
        let mut out = Vec::new();
        let count = expand_topology(PrimitiveKind::TriangleList, &indices, &mut out).unwrap();
        assert_eq!(count, 3);
        assert_eq!(out, indices);
    }

    #[test]
    fn quad_strip_expansion() {
        let mut out = Vec::new();
        let count = expand_topology(PrimitiveKind::QuadStrip, &[0, 1, 2, 3], &mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(out, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn empty_stream_is_an_error() {
        assert!(matches!(decode(&[]), Err(Error::TruncatedPrimitive)));
    }

    #[test]
    fn end_marker_only() {
        let (shape, surfaces, _) = decode(&[END_MARKER]).unwrap();
        assert!(shape.triangle_indices().next().is_none());
        assert!(surfaces.is_empty());
        assert!(shape.flags().contains(ShapeFlags::PRIM_GEOMETRY));
    }

    #[test]
    fn single_strip() {
        let (shape, surfaces, register) =
            decode(&[PrimitiveType::TRIANGLE_STRIP.0, 4, 0, 1, 2, 3, END_MARKER]).unwrap();

        let indices: Vec<u32> = shape.triangle_indices().collect();
        assert_eq!(indices, vec![0, 1, 2, 1, 0, 3]);
        assert_eq!(register, 0x0001_0001);

        let surface = surfaces.surface(1).unwrap();
        assert_eq!(surface.primitive_type, PrimitiveType::TRIANGLE_STRIP.0);
        assert_eq!(surface.primitive_count, 2);
        assert_eq!(surface.index_offset, 0);
    }

    #[test]
    fn quad_strip_input_is_rewritten() {
        let (_, surfaces, register) =
            decode(&[PrimitiveType::QUAD_STRIP_INPUT.0, 4, 0, 1, 2, 3, END_MARKER]).unwrap();

        assert_eq!(register, 0x0000_0201);
        let surface = surfaces.surface(1).unwrap();
        assert_eq!(surface.primitive_type, PrimitiveType::QUAD_STRIP.0);
    }

    #[test]
    fn list_terminator_is_skipped() {
        let (shape, _, _) = decode(&[
            PrimitiveType::TRIANGLE_LIST.0,
            3,
            0,
            1,
            2,
            LIST_TERMINATOR,
            PrimitiveType::TRIANGLE_LIST.0,
            3,
            2,
            1,
            0,
            END_MARKER,
        ])
        .unwrap();

        let indices: Vec<u32> = shape.triangle_indices().collect();
        assert_eq!(indices, vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn complex_primitive_carries_ten_words() {
        let (shape, surfaces, register) = decode(&[
            PrimitiveType::COMPLEX.0,
            10,
            11,
            12,
            13,
            14,
            15,
            16,
            17,
            18,
            19,
            END_MARKER,
        ])
        .unwrap();

        assert_eq!(register, 0x0000_0101);
        assert!(shape.triangle_indices().next().is_none());

        let surface = surfaces.surface(1).unwrap();
        assert_eq!(surface.primitive_count, 1);
        assert_eq!(
            surface.primitive_data,
            vec![10, 11, 12, 13, 14, 15, 16, 17, 18, 19]
        );
    }

    #[test]
    fn unknown_type_is_unsupported() {
        assert!(matches!(
            decode(&[0x1234, END_MARKER]),
            Err(Error::UnsupportedPrimitive(0x1234))
        ));
    }

    #[test]
    fn truncated_mid_primitive() {
        assert!(matches!(
            decode(&[PrimitiveType::TRIANGLE_STRIP.0, 4, 0, 1]),
            Err(Error::TruncatedPrimitive)
        ));
    }

    #[test]
    fn flag_register_keeps_last_primitive() {
        let (_, _, register) = decode(&[
            PrimitiveType::TRIANGLE_STRIP.0,
            3,
            0,
            1,
            2,
            PrimitiveType::POINT_SPRITE.0,
            1,
            0,
            END_MARKER,
        ])
        .unwrap();
        assert_eq!(register, 0x0000_0001);
    }

    #[test]
    fn dedup_across_primitives() {
        let (_, surfaces, _) = decode(&[
            PrimitiveType::TRIANGLE_STRIP.0,
            3,
            0,
            1,
            2,
            PrimitiveType::TRIANGLE_STRIP.0,
            3,
            1,
            2,
            3,
            END_MARKER,
        ])
        .unwrap();

        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces.surface(1).unwrap().primitive_count, 2);
    }
}
