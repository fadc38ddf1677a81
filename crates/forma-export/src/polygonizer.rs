//! Bar polygonizer.
//!
//! Wraps each bar in an n-sided capped prism. Runs in three phases so
//! the worker can abort between them: segment initialization, polygon
//! computation, STL write.

use glam::DVec3;
use tracing::debug;

use forma_types::{FormaError, FormaResult};

use crate::bar::BarData;
use crate::stl::{write_binary_stl, Triangle};

/// Three-phase bar-to-mesh polygonizer.
pub struct Polygonizer {
    data: BarData,
    /// Maximum segment length when subdividing bars.
    resolution: f64,
    /// Bar diameter used when a bar carries none.
    diameter: f64,
    /// Facets around each bar.
    sides: usize,
    segments: Vec<(DVec3, DVec3, f64)>,
    triangles: Vec<Triangle>,
}

impl Polygonizer {
    pub fn new(data: BarData, resolution: f64, diameter: f64, sides: usize) -> Self {
        Self {
            data,
            resolution,
            diameter,
            sides: sides.max(3),
            segments: Vec::new(),
            triangles: Vec::new(),
        }
    }

    /// Phase 1: split bars into segments no longer than the resolution.
    pub fn init_base_segments(&mut self) {
        self.segments.clear();
        for bar in &self.data.bars {
            let len = bar.length();
            if len <= f64::EPSILON {
                continue;
            }
            let diam = if bar.diam > 0.0 { bar.diam } else { self.diameter };
            let n = if self.resolution > 0.0 {
                (len / self.resolution).ceil() as usize
            } else {
                1
            }
            .max(1);
            let step = (bar.end - bar.start) / n as f64;
            for i in 0..n {
                let a = bar.start + step * i as f64;
                self.segments.push((a, a + step, diam));
            }
        }
        debug!(segments = self.segments.len(), "base segments");
    }

    /// Phase 2: mesh each segment as a capped prism.
    pub fn calculate_polygon(&mut self) {
        self.triangles.clear();
        for &(start, end, diam) in &self.segments {
            prism_triangles(start, end, diam / 2.0, self.sides, &mut self.triangles);
        }
        debug!(triangles = self.triangles.len(), "polygon computed");
    }

    /// Phase 3: write the mesh as binary STL.
    pub fn write_stl(&self, path: &std::path::Path) -> FormaResult<()> {
        if self.triangles.is_empty() {
            return Err(FormaError::Export("no geometry to export".into()));
        }
        write_binary_stl(path, &self.triangles)?;
        Ok(())
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Appends the triangles of one capped n-sided prism around a segment.
fn prism_triangles(start: DVec3, end: DVec3, radius: f64, sides: usize, out: &mut Vec<Triangle>) {
    let axis = (end - start).normalize();
    let u = orthonormal(axis);
    let v = axis.cross(u);

    let ring = |center: DVec3, i: usize| -> DVec3 {
        let theta = std::f64::consts::TAU * i as f64 / sides as f64;
        center + radius * (theta.cos() * u + theta.sin() * v)
    };

    for i in 0..sides {
        let j = (i + 1) % sides;
        let (a0, a1) = (ring(start, i), ring(start, j));
        let (b0, b1) = (ring(end, i), ring(end, j));

        // Side quad
        out.push(Triangle::new(a0, b0, b1));
        out.push(Triangle::new(a0, b1, a1));
        // Caps
        out.push(Triangle::new(start, a1, a0));
        out.push(Triangle::new(end, b0, b1));
    }
}

/// Any unit vector perpendicular to `axis`.
fn orthonormal(axis: DVec3) -> DVec3 {
    let pick = if axis.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
    axis.cross(pick).normalize()
}
