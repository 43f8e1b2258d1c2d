//! Surface records and the deduplication table.
//!
//! Surfaces are keyed by `(primitive_type, texture_id, flags)`. The table
//! keeps one collision chain per texture; the chain head index uses
//! `texture_id + 1` so that `-1` ("no texture") maps into slot 0.

use bitflags::bitflags;

use crate::primitive::PrimitiveType;
use crate::Error;

/// Returned by [`SurfaceTable::get_surface_hash`] when no surface matches.
pub const NO_SURFACE: u16 = 0xFFFF;

/// Chain-terminating link value.
const NO_ENTRY: i32 = -1;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct SurfaceStatus: u16 {
        const ACTIVE = 1 << 0;
        const ALPHA = 1 << 1;
    }
}

#[derive(Clone, Debug)]
pub struct Surface {
    pub texture_id: i16,
    pub primitive_type: u16,
    pub flags: u16,
    pub status: SurfaceStatus,
    /// Indices contributed to this surface, in emission order.
    pub indices: Vec<u16>,
    /// Data words of complex primitives attached to this surface.
    pub primitive_data: Vec<u32>,
    pub vertex_offset: u32,
    pub index_offset: u32,
    pub primitive_count: u32,
}

impl Surface {
    fn new(primitive_type: u16, texture_id: i16, flags: u16) -> Self {
        Self {
            texture_id,
            primitive_type,
            flags,
            status: SurfaceStatus::ACTIVE,
            indices: Vec::new(),
            primitive_data: Vec::new(),
            vertex_offset: 0,
            index_offset: 0,
            primitive_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.contains(SurfaceStatus::ACTIVE)
    }
}

#[derive(Copy, Clone, Debug)]
struct HashEntry {
    /// `(primitive_type << 16) | flags`.
    search_key: u32,
    surface_id: u16,
    next: i32,
}

/// Fixed-capacity surface table for one decode session.
#[derive(Debug)]
pub struct SurfaceTable {
    max_textures: usize,
    max_surfaces: usize,
    /// Chain head per texture, indexed by `texture_id + 1`. `-1` is empty.
    first: Vec<i32>,
    entries: Vec<HashEntry>,
    /// Indexed by surface id. Id 0 is reserved and never allocated.
    surfaces: Vec<Surface>,
}

fn search_key(primitive_type: u16, flags: u16) -> u32 {
    (u32::from(primitive_type) << 16) | u32::from(flags)
}

fn is_alpha_primitive(primitive_type: u16) -> bool {
    primitive_type == PrimitiveType::TRIANGLE_STRIP.0
}

impl SurfaceTable {
    pub fn new(max_textures: usize, max_surfaces: usize) -> Self {
        let mut surfaces = Vec::new();
        // Reserved id 0.
        let mut reserved = Surface::new(0, -1, 0);
        reserved.status = SurfaceStatus::empty();
        surfaces.push(reserved);

        Self {
            max_textures,
            max_surfaces,
            first: vec![NO_ENTRY; max_textures + 1],
            entries: Vec::new(),
            surfaces,
        }
    }

    /// Number of allocated surfaces, excluding the reserved id 0.
    pub fn len(&self) -> usize {
        self.surfaces.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_initialized(&self) -> Result<(), Error> {
        if self.max_textures == 0 || self.max_surfaces == 0 {
            return Err(Error::SystemNotInitialized);
        }
        Ok(())
    }

    fn check_texture(&self, texture_id: i16) -> Result<(), Error> {
        if texture_id < -1 || texture_id as isize >= self.max_textures as isize {
            return Err(Error::InvalidTexture(texture_id));
        }
        Ok(())
    }

    fn chain_lookup(&self, primitive_type: u16, texture_id: i16, flags: u16) -> Option<u16> {
        let key = search_key(primitive_type, flags);
        let mut link = self.first[(texture_id + 1) as usize];

        while link != NO_ENTRY {
            let entry = &self.entries[link as usize];
            if entry.search_key == key {
                return Some(entry.surface_id);
            }
            link = entry.next;
        }

        None
    }

    /// Read-only lookup. Returns [`NO_SURFACE`] on miss and never mutates.
    pub fn get_surface_hash(
        &self,
        primitive_type: u16,
        texture_id: i16,
        flags: u16,
    ) -> Result<u16, Error> {
        self.check_initialized()?;
        self.check_texture(texture_id)?;

        Ok(self
            .chain_lookup(primitive_type, texture_id, flags)
            .unwrap_or(NO_SURFACE))
    }

    /// Returns the surface for `(primitive_type, texture_id, flags)`,
    /// allocating it on first use. Matches update their alpha status.
    pub fn get_or_create_surface(
        &mut self,
        primitive_type: u16,
        texture_id: i16,
        flags: u16,
    ) -> Result<u16, Error> {
        self.check_initialized()?;
        self.check_texture(texture_id)?;

        if let Some(id) = self.chain_lookup(primitive_type, texture_id, flags) {
            self.update_surface_alpha(id)?;
            return Ok(id);
        }

        let id = self.surfaces.len();
        if id >= self.max_surfaces {
            return Err(Error::SurfaceLimit(self.max_surfaces));
        }
        if let Some(existing) = self.surfaces.get(id) {
            if existing.is_active() {
                return Err(Error::SurfaceAllocConflict(id as u16));
            }
        }

        let mut surface = Surface::new(primitive_type, texture_id, flags);
        if is_alpha_primitive(primitive_type) {
            surface.status |= SurfaceStatus::ALPHA;
        }
        self.surfaces.push(surface);

        // New entries become the chain head, so the most recent insertion
        // is found first.
        let slot = (texture_id + 1) as usize;
        self.entries.push(HashEntry {
            search_key: search_key(primitive_type, flags),
            surface_id: id as u16,
            next: self.first[slot],
        });
        self.first[slot] = (self.entries.len() - 1) as i32;

        Ok(id as u16)
    }

    /// Re-derives the alpha bit from the surface's primitive type.
    pub fn update_surface_alpha(&mut self, id: u16) -> Result<(), Error> {
        let surface = self
            .surfaces
            .get_mut(id as usize)
            .filter(|s| s.is_active())
            .ok_or(Error::SurfaceNotAllocated(id))?;

        if is_alpha_primitive(surface.primitive_type) {
            surface.status |= SurfaceStatus::ALPHA;
        }
        Ok(())
    }

    pub fn surface(&self, id: u16) -> Result<&Surface, Error> {
        self.surfaces
            .get(id as usize)
            .filter(|s| s.is_active())
            .ok_or(Error::SurfaceNotReady(id))
    }

    pub fn surface_mut(&mut self, id: u16) -> Result<&mut Surface, Error> {
        self.surfaces
            .get_mut(id as usize)
            .filter(|s| s.is_active())
            .ok_or(Error::SurfaceNotReady(id))
    }

    /// Drains the allocated surfaces in id order.
    pub fn into_surfaces(self) -> Vec<Surface> {
        self.surfaces
            .into_iter()
            .skip(1)
            .filter(Surface::is_active)
            .collect()
    }
}
