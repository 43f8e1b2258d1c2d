//! The decoded shape model.

use std::path::Path;

use bitflags::bitflags;
use glam::Vec3;

use crate::animation::AnimationData;
use crate::surface::Surface;
use crate::vertex::{VERTEX_STRIDE, VERTEX_TERMINATOR_BITS};
use crate::{Error, ShapeDecoder};

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u32 {
        /// Geometry came through the `Prim` path.
        const PRIM_GEOMETRY = 1 << 2;
        /// Geometry came through the `Line` path.
        const LINE_GEOMETRY = 1 << 3;
        /// Animation data is attached.
        const ANIMATED = 1 << 7;
    }
}

/// Capacity bounds for one decode session. Exceeding a bound is a typed
/// error, never silent truncation.
#[derive(Copy, Clone, Debug)]
pub struct Limits {
    pub max_surfaces: usize,
    pub max_textures: usize,
    pub max_polygons: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_surfaces: 2000,
            max_textures: 1000,
            max_polygons: 65_536,
        }
    }
}

/// The decoder's output: vertex geometry, triangle topology, surfaces and
/// optional animation data.
#[derive(Clone, Debug)]
pub struct Shape {
    vertex_buffer: Vec<f32>,
    vertex_count: u32,
    primitive_buffer: Vec<u16>,
    surfaces: Vec<Surface>,
    animation: Option<AnimationData>,
    flags: ShapeFlags,
    texture_id: i16,
    texture_names: Vec<String>,
    bounding_box: Option<(Vec3, Vec3)>,
}

impl Shape {
    pub(crate) fn new() -> Self {
        Self {
            vertex_buffer: Vec::new(),
            vertex_count: 0,
            primitive_buffer: Vec::new(),
            surfaces: Vec::new(),
            animation: None,
            flags: ShapeFlags::empty(),
            texture_id: -1,
            texture_names: Vec::new(),
            bounding_box: None,
        }
    }

    pub fn from_slice(buf: &[u8]) -> Result<Self, Error> {
        ShapeDecoder::new().decode(buf)
    }

    pub fn from_file<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let buf = std::fs::read(path)?;
        Self::from_slice(&buf)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Floats per vertex. Always 8: `x, y, z` plus five reserved lanes.
    pub fn vertex_stride(&self) -> usize {
        VERTEX_STRIDE
    }

    /// The raw stride-8 vertex buffer, including the trailing terminator.
    pub fn vertex_buffer(&self) -> &[f32] {
        &self.vertex_buffer
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        let end = self.vertex_count as usize * VERTEX_STRIDE;
        self.vertex_buffer[..end]
            .chunks_exact(VERTEX_STRIDE)
            .map(|v| Vec3::new(v[0], v[1], v[2]))
    }

    /// Normal lanes are reserved by the current codecs.
    pub fn normals(&self) -> Option<&[f32]> {
        None
    }

    /// Texture-coordinate lanes are reserved by the current codecs.
    pub fn texcoords(&self) -> Option<&[f32]> {
        None
    }

    /// Color lanes are reserved by the current codecs.
    pub fn colors(&self) -> Option<&[f32]> {
        None
    }

    /// Triangle-list indices into the vertex buffer.
    pub fn indices(&self) -> &[u16] {
        &self.primitive_buffer
    }

    /// The triangle-list indices widened for 32-bit consumers.
    pub fn triangle_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.primitive_buffer.iter().map(|&i| u32::from(i))
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn animation(&self) -> Option<&AnimationData> {
        self.animation.as_ref()
    }

    pub fn has_animation(&self) -> bool {
        self.animation.is_some()
    }

    pub fn flags(&self) -> ShapeFlags {
        self.flags
    }

    /// Current texture id; `-1` means "no texture".
    pub fn texture_id(&self) -> i16 {
        self.texture_id
    }

    pub fn texture_names(&self) -> &[String] {
        &self.texture_names
    }

    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.bounding_box
    }

    pub(crate) fn insert_flags(&mut self, flags: ShapeFlags) {
        self.flags |= flags;
    }

    pub(crate) fn primitive_buffer_mut(&mut self) -> &mut Vec<u16> {
        &mut self.primitive_buffer
    }

    pub(crate) fn animation_mut(&mut self) -> &mut AnimationData {
        self.flags |= ShapeFlags::ANIMATED;
        self.animation.get_or_insert_with(AnimationData::default)
    }

    pub(crate) fn set_surfaces(&mut self, surfaces: Vec<Surface>) {
        self.surfaces = surfaces;
    }

    pub(crate) fn set_texture_names(&mut self, names: Vec<String>) {
        if !names.is_empty() && self.texture_id < 0 {
            self.texture_id = 0;
        }
        self.texture_names = names;
    }

    /// Appends a decoded, terminated vertex buffer, keeping exactly one
    /// terminator at the tail.
    pub(crate) fn append_vertices(&mut self, mut decoded: Vec<f32>) {
        if self
            .vertex_buffer
            .last()
            .is_some_and(|f| f.to_bits() == VERTEX_TERMINATOR_BITS)
        {
            self.vertex_buffer.pop();
        }
        self.vertex_buffer.append(&mut decoded);
        self.vertex_count = ((self.vertex_buffer.len() - 1) / VERTEX_STRIDE) as u32;
    }

    pub(crate) fn compute_bounding_box(&mut self) {
        let bounds = {
            let mut positions = self.positions();
            positions.next().map(|first| {
                positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p)))
            })
        };
        self.bounding_box = bounds;
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        for &index in &self.primitive_buffer {
            if u32::from(index) >= self.vertex_count {
                return Err(Error::IndexOutOfRange {
                    index,
                    vertex_count: self.vertex_count,
                });
            }
        }

        debug_assert!(
            self.vertex_buffer.is_empty()
                || self.vertex_buffer.len() == self.vertex_count as usize * VERTEX_STRIDE + 1
        );
        debug_assert!(self
            .vertex_buffer
            .last()
            .is_none_or(|f| f.to_bits() == VERTEX_TERMINATOR_BITS));
        debug_assert!(self
            .surfaces
            .iter()
            .all(|s| s.is_active() && s.primitive_count > 0));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Shape;
    use crate::vertex::{packed_to_float_3component, VERTEX_TERMINATOR_BITS};
    use crate::Error;

    fn packed(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn append_vertices_keeps_single_terminator() {
        let mut shape = Shape::new();
        shape.append_vertices(packed_to_float_3component(&packed(&[1, 2, 3])).unwrap());
        shape.append_vertices(packed_to_float_3component(&packed(&[4, 5, 6])).unwrap());

        assert_eq!(shape.vertex_count(), 2);
        assert_eq!(shape.vertex_buffer().len(), 17);
        let terminators = shape
            .vertex_buffer()
            .iter()
            .filter(|f| f.to_bits() == VERTEX_TERMINATOR_BITS)
            .count();
        assert_eq!(terminators, 1);
    }

    #[test]
    fn positions_skip_reserved_lanes_and_terminator() {
        let mut shape = Shape::new();
        shape.append_vertices(packed_to_float_3component(&packed(&[1, 2, 3, 4, 5, 6])).unwrap());

        let positions: Vec<_> = shape.positions().collect();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].to_array(), [1.0, 2.0, 3.0]);
        assert_eq!(positions[1].to_array(), [4.0, 5.0, 6.0]);
    }

    #[test]
    fn bounding_box() {
        let mut shape = Shape::new();
        shape.compute_bounding_box();
        assert!(shape.bounding_box().is_none());

        shape.append_vertices(
            packed_to_float_3component(&packed(&[1, -2, 3, -4, 5, 6])).unwrap(),
        );
        shape.compute_bounding_box();

        let (min, max) = shape.bounding_box().unwrap();
        assert_eq!(min.to_array(), [-4.0, -2.0, 3.0]);
        assert_eq!(max.to_array(), [1.0, 5.0, 6.0]);
    }

    #[test]
    fn validate_rejects_out_of_range_indices() {
        let mut shape = Shape::new();
        shape.append_vertices(packed_to_float_3component(&packed(&[1, 2, 3])).unwrap());
        shape.primitive_buffer_mut().extend_from_slice(&[0, 0, 1]);

        assert!(matches!(
            shape.validate().unwrap_err(),
            Error::IndexOutOfRange {
                index: 1,
                vertex_count: 1
            }
        ));
    }

    #[test]
    fn texture_names_select_texture_zero() {
        let mut shape = Shape::new();
        assert_eq!(shape.texture_id(), -1);
        shape.set_texture_names(vec![String::from("hull")]);
        assert_eq!(shape.texture_id(), 0);
    }
}
