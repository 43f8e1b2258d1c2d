//! Wavefront OBJ/MTL serialization.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use gm_model::{PrimitiveKind, PrimitiveType, Shape, Surface};

pub fn write(shape: &Shape, path: &Path, materials: bool) -> io::Result<()> {
    let mtl_path = path.with_extension("mtl");
    let write_mtl = materials && !shape.texture_names().is_empty();

    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    if write_mtl {
        if let Some(name) = mtl_path.file_name() {
            writeln!(out, "mtllib {}", name.to_string_lossy())?;
        }
    }

    for position in shape.positions() {
        writeln!(out, "v {} {} {}", position.x, position.y, position.z)?;
    }

    for (index, surface) in shape.surfaces().iter().enumerate() {
        writeln!(out, "g surface_{}", index + 1)?;
        if write_mtl {
            if let Some(name) = texture_name(shape, surface) {
                writeln!(out, "usemtl {name}")?;
            }
        }
        write_surface(&mut out, surface)?;
    }

    out.flush()?;

    if write_mtl {
        write_material_lib(shape, &mtl_path)?;
    }

    Ok(())
}

fn write_surface<W>(out: &mut W, surface: &Surface) -> io::Result<()>
where
    W: Write,
{
    match PrimitiveType(surface.primitive_type).kind() {
        // Expanded kinds carry triangle-list indices.
        Some(
            PrimitiveKind::Triangle
            | PrimitiveKind::TriangleStrip
            | PrimitiveKind::TriangleList
            | PrimitiveKind::QuadStrip,
        ) => {
            for triangle in surface.indices.chunks_exact(3) {
                // OBJ indices are 1-based.
                writeln!(
                    out,
                    "f {} {} {}",
                    triangle[0] + 1,
                    triangle[1] + 1,
                    triangle[2] + 1
                )?;
            }
        }
        Some(PrimitiveKind::LineStrip) => {
            if !surface.indices.is_empty() {
                write!(out, "l")?;
                for index in &surface.indices {
                    write!(out, " {}", index + 1)?;
                }
                writeln!(out)?;
            }
        }
        Some(PrimitiveKind::PointSprite) => {
            if !surface.indices.is_empty() {
                write!(out, "p")?;
                for index in &surface.indices {
                    write!(out, " {}", index + 1)?;
                }
                writeln!(out)?;
            }
        }
        // Complex primitives have no OBJ representation.
        Some(PrimitiveKind::Complex) | None => {}
    }

    Ok(())
}

fn texture_name<'a>(shape: &'a Shape, surface: &Surface) -> Option<&'a str> {
    usize::try_from(surface.texture_id)
        .ok()
        .and_then(|id| shape.texture_names().get(id))
        .map(String::as_str)
}

fn write_material_lib(shape: &Shape, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    for name in shape.texture_names() {
        writeln!(out, "newmtl {name}")?;
        writeln!(out, "Kd 1.0 1.0 1.0")?;
        writeln!(out, "map_Kd {name}")?;
        writeln!(out)?;
    }

    out.flush()
}
