//! Vertex codecs.
//!
//! All three codecs decode into the same layout: eight floats per vertex
//! (`x, y, z` plus five reserved lanes) followed by a single terminator
//! float. The terminator is compared by bit pattern, never by value.

use crate::reader::{complex_swap32, Reader};
use crate::Error;

/// Floats per vertex in the decoded buffer.
pub const VERTEX_STRIDE: usize = 8;

/// Bit pattern of the sentinel float trailing every decoded vertex buffer.
pub const VERTEX_TERMINATOR_BITS: u32 = 0x7FC0_0001;

/// The sentinel float itself (a quiet NaN).
pub const VERTEX_TERMINATOR: f32 = f32::from_bits(VERTEX_TERMINATOR_BITS);

/// Decodes a `Dot2` payload: an 8-byte compression-parameter block followed
/// by one big-endian-packed 12-byte integer triple per vertex.
pub fn packed_to_float(payload: &[u8]) -> Result<Vec<f32>, Error> {
    decode_packed(payload, "PackedToFloat", 8)
}

/// Sequential variant of [`packed_to_float`] without the leading parameter
/// block.
pub fn packed_to_float_3component(payload: &[u8]) -> Result<Vec<f32>, Error> {
    decode_packed(payload, "PackedToFloat3Component", 0)
}

fn decode_packed(payload: &[u8], codec: &'static str, skip: usize) -> Result<Vec<f32>, Error> {
    let body = payload.len().checked_sub(skip);
    let count = match body {
        Some(body) if body % 12 == 0 => body / 12,
        _ => {
            return Err(Error::VertexPayload {
                codec,
                size: payload.len(),
            })
        }
    };

    let mut r = Reader::new(payload);
    r.skip(skip)?;

    let mut out = Vec::with_capacity(count * VERTEX_STRIDE + 1);
    for _ in 0..count {
        let x = complex_swap32(r.u32_le()?) as i32;
        let y = complex_swap32(r.u32_le()?) as i32;
        let z = complex_swap32(r.u32_le()?) as i32;
        push_vertex(&mut out, x as f32, y as f32, z as f32);
    }

    out.push(VERTEX_TERMINATOR);
    Ok(out)
}

/// Decodes an `FDot` payload: a 24-byte parameter block followed by three
/// big-endian 16-bit components per vertex.
pub fn decrunch_dots(payload: &[u8]) -> Result<Vec<f32>, Error> {
    let count = match payload.len().checked_sub(24) {
        Some(body) if body % 6 == 0 => body / 6,
        _ => {
            return Err(Error::VertexPayload {
                codec: "DecrunchDots",
                size: payload.len(),
            })
        }
    };

    let mut r = Reader::new(payload);
    // Six-word parameter block. The per-axis scale it encodes is not
    // applied; components pass through unscaled.
    r.skip(24)?;

    let mut out = Vec::with_capacity(count * VERTEX_STRIDE + 1);
    for _ in 0..count {
        let x = r.i16_be()?;
        let y = r.i16_be()?;
        let z = r.i16_be()?;
        push_vertex(&mut out, x.into(), y.into(), z.into());
    }

    out.push(VERTEX_TERMINATOR);
    Ok(out)
}

fn push_vertex(out: &mut Vec<f32>, x: f32, y: f32, z: f32) {
    out.extend_from_slice(&[x, y, z, 0.0, 0.0, 0.0, 0.0, 0.0]);
}
