//! Bicubic Bezier patch surfaces.
//!
//! A [`Surface`] is an ordered list of [`Patch`]es in its own modelling frame
//! (contact point, heading, up). Drawing places the contact point at the turtle
//! and aligns the modelling frame with the turtle frame.

use std::sync::Arc;

use super::cache::{GridCache, GridSource};
use super::core::{BBox, Point3, Vec3};
use super::frame::OrientationFrame;
use super::mesh::Vertex;

pub const DEFAULT_PATCH_DIVISIONS: usize = 8;
pub const MAX_PATCH_DIVISIONS: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface file line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("surface `{name}` has no patches")]
    NoPatches { name: String },
}

/// Evaluated tessellation grid: `(s_count) x (t_count)` vertices, row-major in t.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGrid {
    pub s_count: usize,
    pub t_count: usize,
    pub vertices: Vec<Vertex>,
}

impl SurfaceGrid {
    #[must_use]
    pub fn vertex(&self, s: usize, t: usize) -> Vertex {
        self.vertices[t * self.s_count + s]
    }

    /// Row `t` of the grid (constant t, varying s).
    #[must_use]
    pub fn row(&self, t: usize) -> &[Vertex] {
        &self.vertices[t * self.s_count..(t + 1) * self.s_count]
    }

    /// Number of quads in the grid.
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.s_count.saturating_sub(1) * self.t_count.saturating_sub(1)
    }

    /// Builds a grid by sampling `eval(s, t) -> (point, ds, dt)` at `s_div x t_div` cells.
    pub fn sample(
        s_div: usize,
        t_div: usize,
        eval: impl Fn(f64, f64) -> (Point3, Vec3, Vec3),
    ) -> Self {
        let s_div = s_div.clamp(1, MAX_PATCH_DIVISIONS);
        let t_div = t_div.clamp(1, MAX_PATCH_DIVISIONS);
        let mut vertices = Vec::with_capacity((s_div + 1) * (t_div + 1));
        for j in 0..=t_div {
            let t = j as f64 / t_div as f64;
            for i in 0..=s_div {
                let s = i as f64 / s_div as f64;
                let (position, ds, dt) = eval(s, t);
                let normal = ds.cross(dt).normalized().unwrap_or_else(|| {
                    // Collapsed edge: take the derivatives slightly inside the patch.
                    let s_in = s + if s < 0.5 { 1e-3 } else { -1e-3 };
                    let t_in = t + if t < 0.5 { 1e-3 } else { -1e-3 };
                    let (_, ds, dt) = eval(s_in, t_in);
                    ds.cross(dt).normalized_or(Vec3::Z)
                });
                vertices.push(Vertex { position, normal, uv: [s, t] });
            }
        }
        Self { s_count: s_div + 1, t_count: t_div + 1, vertices }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub name: String,
    /// Control points indexed `[row][column]`, row along t and column along s.
    pub control: [[Point3; 4]; 4],
}

impl Patch {
    #[must_use]
    pub fn new(name: impl Into<String>, control: [[Point3; 4]; 4]) -> Self {
        Self { name: name.into(), control }
    }

    /// Position and the two partial derivatives at `(s, t)`.
    #[must_use]
    pub fn evaluate(&self, s: f64, t: f64) -> (Point3, Vec3, Vec3) {
        let (bs, dbs) = bernstein3(s);
        let (bt, dbt) = bernstein3(t);
        let mut p = Vec3::ZERO;
        let mut ds = Vec3::ZERO;
        let mut dt = Vec3::ZERO;
        for (row, points) in self.control.iter().enumerate() {
            for (col, point) in points.iter().enumerate() {
                let v = point.to_vec3();
                p += v * (bs[col] * bt[row]);
                ds += v * (dbs[col] * bt[row]);
                dt += v * (bs[col] * dbt[row]);
            }
        }
        (Point3::ORIGIN + p, ds, dt)
    }

    #[must_use]
    pub fn grid(&self, s_div: usize, t_div: usize) -> SurfaceGrid {
        SurfaceGrid::sample(s_div, t_div, |s, t| self.evaluate(s, t))
    }

    pub fn control_points(&self) -> impl Iterator<Item = Point3> + '_ {
        self.control.iter().flatten().copied()
    }
}

/// Cubic Bernstein basis and its derivative.
fn bernstein3(t: f64) -> ([f64; 4], [f64; 4]) {
    let u = 1.0 - t;
    (
        [u * u * u, 3.0 * t * u * u, 3.0 * t * t * u, t * t * t],
        [-3.0 * u * u, 3.0 * u * u - 6.0 * t * u, 6.0 * t * u - 3.0 * t * t, 3.0 * t * t],
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub name: String,
    pub patches: Vec<Patch>,
    /// Modelling size; drawing with scale `s` scales the surface by `s / size`.
    pub size: f64,
    pub contact: Point3,
    pub heading: Vec3,
    pub up: Vec3,
    pub texture: Option<usize>,
    pub s_divisions: usize,
    pub t_divisions: usize,
    bounds: Option<BBox>,
}

impl Surface {
    pub fn new(name: impl Into<String>, patches: Vec<Patch>) -> Result<Self, SurfaceError> {
        let name = name.into();
        if patches.is_empty() {
            return Err(SurfaceError::NoPatches { name });
        }
        let points: Vec<Point3> = patches.iter().flat_map(Patch::control_points).collect();
        Ok(Self {
            name,
            bounds: BBox::from_points(&points),
            patches,
            size: 1.0,
            contact: Point3::ORIGIN,
            heading: Vec3::Y,
            up: Vec3::Z,
            texture: None,
            s_divisions: DEFAULT_PATCH_DIVISIONS,
            t_divisions: DEFAULT_PATCH_DIVISIONS,
        })
    }

    /// Bounding box of the control points (the convex hull property makes it conservative).
    #[must_use]
    pub fn bounds(&self) -> Option<BBox> {
        self.bounds
    }

    /// Maps a surface-space vertex into the turtle's frame at `scale`.
    #[must_use]
    pub fn place(&self, frame: &OrientationFrame, scale: f64, vertex: Vertex) -> Vertex {
        let left = self.up.cross(self.heading).normalized_or(-Vec3::X);
        let factor = if self.size.abs() > 0.0 { scale / self.size } else { scale };
        let d = vertex.position - self.contact;
        let position = frame.local_to_world(
            d.dot(self.heading) * factor,
            d.dot(left) * factor,
            d.dot(self.up) * factor,
        );
        let n = vertex.normal;
        let normal = (frame.heading * n.dot(self.heading)
            + frame.left * n.dot(left)
            + frame.up * n.dot(self.up))
        .normalized_or(frame.up);
        Vertex { position, normal, uv: vertex.uv }
    }
}

/// Surface gallery; a surface whose file failed to parse stays unloaded (`None`).
#[derive(Debug, Clone, Default)]
pub struct SurfaceGallery {
    surfaces: Vec<Option<Surface>>,
}

impl SurfaceGallery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads one surface file into the next id.
    pub fn load(&mut self, text: &str) -> Result<usize, SurfaceError> {
        let id = self.surfaces.len();
        match crate::parse::surface_file::parse_surface(text) {
            Ok(surface) => {
                log::debug!("surface {id} `{}`: {} patches", surface.name, surface.patches.len());
                self.surfaces.push(Some(surface));
                Ok(id)
            }
            Err(err) => {
                self.surfaces.push(None);
                Err(err)
            }
        }
    }

    pub fn push(&mut self, surface: Surface) -> usize {
        self.surfaces.push(Some(surface));
        self.surfaces.len() - 1
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&Surface> {
        self.surfaces.get(id).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Tessellation grids of every patch of surface `id`, computed on first use.
    ///
    /// `divisions` overrides the surface's own (s, t) divisions.
    #[must_use]
    pub fn grids(
        &self,
        id: usize,
        divisions: Option<usize>,
        cache: &mut GridCache,
    ) -> Option<Vec<Arc<SurfaceGrid>>> {
        let surface = self.get(id)?;
        let (s_div, t_div) = match divisions {
            Some(d) => (d, d),
            None => (surface.s_divisions, surface.t_divisions),
        };
        Some(
            surface
                .patches
                .iter()
                .enumerate()
                .map(|(patch, p)| {
                    cache.get_or_insert_grid(
                        GridSource::Patch { surface: id, patch },
                        s_div,
                        t_div,
                        || p.grid(s_div, t_div),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_patch() -> Patch {
        let mut control = [[Point3::ORIGIN; 4]; 4];
        for (row, points) in control.iter_mut().enumerate() {
            for (col, p) in points.iter_mut().enumerate() {
                *p = Point3::new(col as f64, row as f64, 0.0);
            }
        }
        Patch::new("flat", control)
    }

    #[test]
    fn patch_interpolates_corners() {
        let patch = flat_patch();
        assert_eq!(patch.evaluate(0.0, 0.0).0, Point3::new(0.0, 0.0, 0.0));
        let (p, _, _) = patch.evaluate(1.0, 1.0);
        assert!(p.distance_to(Point3::new(3.0, 3.0, 0.0)) < 1e-12);
    }

    #[test]
    fn flat_patch_normals_are_plus_z() {
        let grid = flat_patch().grid(4, 3);
        assert_eq!(grid.s_count, 5);
        assert_eq!(grid.t_count, 4);
        assert_eq!(grid.quad_count(), 12);
        for v in &grid.vertices {
            assert!((v.normal - Vec3::Z).length() < 1e-12);
        }
    }

    #[test]
    fn place_moves_contact_to_turtle() {
        let surface = Surface::new("s", vec![flat_patch()]).unwrap();
        let mut frame = OrientationFrame::default();
        frame.position = Point3::new(5.0, 0.0, 0.0);
        let placed = surface.place(&frame, 1.0, Vertex::plain(Point3::ORIGIN, Vec3::Z));
        assert_eq!(placed.position, Point3::new(5.0, 0.0, 0.0));
        assert!((placed.normal - frame.up).length() < 1e-12);
    }

    #[test]
    fn grids_are_cached() {
        let mut gallery = SurfaceGallery::new();
        let id = gallery.push(Surface::new("s", vec![flat_patch(), flat_patch()]).unwrap());
        let mut cache = GridCache::new();
        let first = gallery.grids(id, None, &mut cache).unwrap();
        let second = gallery.grids(id, None, &mut cache).unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        let stats = cache.stats();
        assert_eq!(stats.grid_misses, 2);
        assert_eq!(stats.grid_hits, 2);
    }
}
