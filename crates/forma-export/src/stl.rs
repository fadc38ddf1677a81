//! Binary STL writer.
//!
//! 80-byte header, little-endian u32 triangle count, then 50 bytes per
//! triangle: facet normal, three vertices (f32 each), and a zero
//! attribute word.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glam::DVec3;

/// One facet with a computed normal.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [DVec3; 3],
    pub normal: DVec3,
}

impl Triangle {
    /// Builds a facet; the normal follows the right-hand winding.
    pub fn new(a: DVec3, b: DVec3, c: DVec3) -> Self {
        let n = (b - a).cross(c - a);
        let normal = if n.length() > f64::EPSILON {
            n.normalize()
        } else {
            DVec3::ZERO
        };
        Self {
            vertices: [a, b, c],
            normal,
        }
    }
}

/// Writes the triangle list to `path` in binary STL format.
pub fn write_binary_stl(path: &Path, triangles: &[Triangle]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    let mut header = [0u8; 80];
    let tag = b"forma binary stl";
    header[..tag.len()].copy_from_slice(tag);
    w.write_all(&header)?;
    w.write_all(&(triangles.len() as u32).to_le_bytes())?;

    for t in triangles {
        write_vec(&mut w, t.normal)?;
        for v in t.vertices {
            write_vec(&mut w, v)?;
        }
        w.write_all(&0u16.to_le_bytes())?;
    }
    w.flush()
}

fn write_vec(w: &mut impl Write, v: DVec3) -> std::io::Result<()> {
    for c in [v.x, v.y, v.z] {
        w.write_all(&(c as f32).to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_size_matches_triangle_count() {
        let dir = std::env::temp_dir().join("forma_stl_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tri.stl");

        let tris = vec![
            Triangle::new(DVec3::ZERO, DVec3::X, DVec3::Y),
            Triangle::new(DVec3::ZERO, DVec3::Y, DVec3::Z),
        ];
        write_binary_stl(&path, &tris).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, 84 + 2 * 50);
        std::fs::remove_file(&path).unwrap();
    }
}
