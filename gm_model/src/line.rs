//! The `Line` chunk pipeline.
//!
//! Unlike `Prim` payloads, `Line` payloads encode surfaces directly. All
//! tokens are big-endian. The pipeline rewrites the token stream into an
//! owned 32-bit work buffer across four phases: segment reading with type
//! rewrites queued, rewrite fixup, the line-data run, and complex-primitive
//! materialization.

use crate::primitive::{PrimitiveType, END_MARKER, LINE_DATA_END};
use crate::reader::Reader;
use crate::shape::{Shape, ShapeFlags};
use crate::surface::SurfaceTable;
use crate::Error;

/// Type token that materializes a complex primitive in phase 4.
const COMPLEX_INPUT: u16 = 17165;

/// Words in a scratch primitive record.
const RECORD_WORDS: usize = 18;
/// Record slot holding the primitive type.
const TYPE_SLOT: usize = 0;
/// Record slot holding the flag word.
const FLAG_SLOT: usize = 5;

/// Sentinel emitted when a line-data run terminates.
const LINE_DATA_SENTINEL: u32 = 0xFFFF_FFFF;
/// Sentinel closing the work buffer.
const FINAL_SENTINEL: u32 = 0xFFFF_FFFE;

struct PendingRecord {
    record: [u32; RECORD_WORDS],
    converted_type: Option<u16>,
}

fn line_conversion(ty: u16) -> Option<u16> {
    if ty == PrimitiveType::LINE_STRIP.0 || ty == PrimitiveType::LINE_STRIP_ALT.0 {
        Some(PrimitiveType::POINT_SPRITE.0)
    } else if ty == PrimitiveType::QUAD_STRIP_INPUT.0 {
        Some(PrimitiveType::QUAD_STRIP.0)
    } else {
        None
    }
}

pub(crate) fn decode_line_chunk(
    data: &[u8],
    shape: &mut Shape,
    surfaces: &mut SurfaceTable,
) -> Result<(), Error> {
    let mut r = Reader::new(data);
    let mut out: Vec<u32> = Vec::new();
    let mut records: Vec<PendingRecord> = Vec::new();

    // Phase 1: segment reading. Each primitive is a type token followed by
    // a segment count and that many segments.
    let mut token = r.u16_be().map_err(|_| Error::TruncatedLine)?;
    while token != END_MARKER {
        let count = r.u16_be().map_err(|_| Error::TruncatedLine)?;
        let segments_at = out.len();
        for _ in 0..count {
            let segment = r.u16_be().map_err(|_| Error::TruncatedLine)?;
            out.push(segment.into());
        }

        if let Some(converted) = line_conversion(token) {
            let mut record = [0u32; RECORD_WORDS];
            record[TYPE_SLOT] = token.into();
            record[1] = count.into();
            for (slot, segment) in record[2..].iter_mut().zip(&out[segments_at..]) {
                *slot = *segment;
            }
            records.push(PendingRecord {
                record,
                converted_type: Some(converted),
            });
        }

        token = r.u16_be().map_err(|_| Error::TruncatedLine)?;
    }

    // Phase 2: type rewrite fixup. The canonical type lands in slot 0 and
    // the flag slot is cleared.
    for pending in &mut records {
        if let Some(converted) = pending.converted_type.take() {
            pending.record[TYPE_SLOT] = converted.into();
            pending.record[FLAG_SLOT] = 0;
        }
    }

    // Phase 3: line-data run.
    loop {
        let word = r.u16_be().map_err(|_| Error::TruncatedLine)?;
        if word == LINE_DATA_END {
            out.push(LINE_DATA_SENTINEL);
            break;
        }
        out.push(word.into());
    }

    // Phase 4: complex-primitive materialization from the first 13 output
    // words, using the record's fixed field permutation.
    if r.remaining() >= 2 {
        let next = r.u16_be().map_err(|_| Error::TruncatedLine)?;
        if next == COMPLEX_INPUT {
            if out.len() < 13 {
                return Err(Error::TruncatedLine);
            }
            let mut record = [0u32; RECORD_WORDS];
            record[TYPE_SLOT] = PrimitiveType::COMPLEX.0.into();
            record[3] = out[2];
            record[4] = out[3];
            record[9] = out[4];
            record[6] = out[10];
            record[12] = out[5];
            record[7] = out[11];
            record[8] = out[12];
            record[10] = out[6];
            record[13] = out[7];
            record[11] = out[8];
            record[14] = out[9];
            records.push(PendingRecord {
                record,
                converted_type: None,
            });
        }
    }

    out.push(FINAL_SENTINEL);

    for pending in &records {
        let ty = pending.record[TYPE_SLOT] as u16;
        let flags = pending.record[FLAG_SLOT] as u16;
        let id = surfaces.get_or_create_surface(ty, shape.texture_id(), flags)?;

        let surface = surfaces.surface_mut(id)?;
        surface.primitive_data.extend_from_slice(&pending.record);
        surface.primitive_count += 1;
    }

    shape.insert_flags(ShapeFlags::LINE_GEOMETRY);
    Ok(())
}
