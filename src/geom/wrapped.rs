//! Wrapped surfaces: tensor-product cubic B-spline surfaces over a resizable
//! `rows x cols` control net.
//!
//! Rows run along v (clamped), columns along u. A closed surface wraps in u,
//! which is how tube-like organs (petals folded around an axis, fruit) are
//! modelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::bspline::{CUBIC, eval_clamped, eval_periodic};
use super::cache::{GridCache, GridSource};
use super::core::{Point3, Vec3};
use super::frame::OrientationFrame;
use super::mesh::Vertex;
use super::patch::SurfaceGrid;

pub const MIN_NET_SIZE: usize = 2;
pub const MAX_NET_SIZE: usize = 64;
pub const DEFAULT_RESOLUTION: (usize, usize) = (12, 12);

const DERIVATIVE_STEP: f64 = 1e-4;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, thiserror::Error)]
pub enum WrappedSurfaceError {
    #[error("wrapped surface file line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error(
        "control net must be between {} and {} in each direction, got {rows}x{cols}",
        MIN_NET_SIZE,
        MAX_NET_SIZE
    )]
    InvalidSize { rows: usize, cols: usize },
    #[error("control net {rows}x{cols} needs {expected} points, got {actual}")]
    PointCount { rows: usize, cols: usize, expected: usize, actual: usize },
    #[error("control point ({row}, {col}) is outside the {rows}x{cols} net")]
    OutOfRange { row: usize, col: usize, rows: usize, cols: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrappedSurface {
    pub name: String,
    rows: usize,
    cols: usize,
    control: Vec<Point3>,
    closed: bool,
    /// Tessellation hint `(u_div, v_div)`.
    pub resolution: (usize, usize),
    revision: u64,
}

fn check_size(rows: usize, cols: usize) -> Result<(), WrappedSurfaceError> {
    let valid = MIN_NET_SIZE..=MAX_NET_SIZE;
    if valid.contains(&rows) && valid.contains(&cols) {
        Ok(())
    } else {
        Err(WrappedSurfaceError::InvalidSize { rows, cols })
    }
}

impl WrappedSurface {
    pub fn new(
        name: impl Into<String>,
        rows: usize,
        cols: usize,
        control: Vec<Point3>,
        closed: bool,
    ) -> Result<Self, WrappedSurfaceError> {
        check_size(rows, cols)?;
        if control.len() != rows * cols {
            return Err(WrappedSurfaceError::PointCount {
                rows,
                cols,
                expected: rows * cols,
                actual: control.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            rows,
            cols,
            control,
            closed,
            resolution: DEFAULT_RESOLUTION,
            revision: next_revision(),
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Changes whenever the control net changes; keys cached grids.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn control_point(&self, row: usize, col: usize) -> Option<Point3> {
        (row < self.rows && col < self.cols).then(|| self.control[row * self.cols + col])
    }

    pub fn control_points(&self) -> &[Point3] {
        &self.control
    }

    pub fn set_control_point(
        &mut self,
        row: usize,
        col: usize,
        point: Point3,
    ) -> Result<(), WrappedSurfaceError> {
        if row >= self.rows || col >= self.cols {
            return Err(WrappedSurfaceError::OutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        self.control[row * self.cols + col] = point;
        self.revision = next_revision();
        Ok(())
    }

    /// Resizes the control net in place, re-fitting it by sampling the current surface.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<(), WrappedSurfaceError> {
        check_size(rows, cols)?;
        if rows == self.rows && cols == self.cols {
            return Ok(());
        }
        let mut control = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            let v = r as f64 / (rows - 1) as f64;
            for c in 0..cols {
                let u = if self.closed {
                    c as f64 / cols as f64
                } else {
                    c as f64 / (cols - 1) as f64
                };
                control.push(self.point_at(u, v));
            }
        }
        self.rows = rows;
        self.cols = cols;
        self.control = control;
        self.revision = next_revision();
        Ok(())
    }

    /// Point-wise interpolation towards `other`; `other` is resampled to this net size first.
    ///
    /// Neither operand changes.
    pub fn interpolate(&self, other: &Self, t: f64) -> Result<Self, WrappedSurfaceError> {
        let resized;
        let other = if other.rows == self.rows && other.cols == self.cols {
            other
        } else {
            let mut copy = other.clone();
            copy.resize(self.rows, self.cols)?;
            resized = copy;
            &resized
        };
        let control = self
            .control
            .iter()
            .zip(&other.control)
            .map(|(a, b)| a.lerp(*b, t))
            .collect();
        let mut result = Self::new(
            format!("{}~{}", self.name, other.name),
            self.rows,
            self.cols,
            control,
            self.closed,
        )?;
        result.resolution = (
            lerp_count(self.resolution.0, other.resolution.0, t),
            lerp_count(self.resolution.1, other.resolution.1, t),
        );
        Ok(result)
    }

    fn row_curve_point(&self, row: usize, u: f64) -> Point3 {
        let points = &self.control[row * self.cols..(row + 1) * self.cols];
        if self.closed {
            eval_periodic(points, u)
        } else {
            eval_clamped(points, CUBIC, u)
        }
    }

    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let column: Vec<Point3> = (0..self.rows).map(|r| self.row_curve_point(r, u)).collect();
        eval_clamped(&column, CUBIC, v)
    }

    /// Position and partial derivatives at `(u, v)` in `[0, 1]^2`.
    #[must_use]
    pub fn evaluate(&self, u: f64, v: f64) -> (Point3, Vec3, Vec3) {
        let p = self.point_at(u, v);
        let h = DERIVATIVE_STEP;
        let (u0, u1) = if self.closed {
            (u - h, u + h)
        } else {
            ((u - h).max(0.0), (u + h).min(1.0))
        };
        let (v0, v1) = ((v - h).max(0.0), (v + h).min(1.0));
        let du = (self.point_at(u1, v) - self.point_at(u0, v)) / (u1 - u0);
        let dv = (self.point_at(u, v1) - self.point_at(u, v0)) / (v1 - v0);
        (p, du, dv)
    }

    #[must_use]
    pub fn grid(&self, u_div: usize, v_div: usize) -> SurfaceGrid {
        let mut grid = SurfaceGrid::sample(u_div, v_div, |u, v| self.evaluate(u, v));
        if self.closed {
            // Close the seam exactly.
            for t in 0..grid.t_count {
                let first = grid.vertex(0, t);
                let last = t * grid.s_count + grid.s_count - 1;
                grid.vertices[last].position = first.position;
                grid.vertices[last].normal = first.normal;
            }
        }
        grid
    }

    /// Maps a model-space vertex into the turtle frame at `scale`.
    #[must_use]
    pub fn place(frame: &OrientationFrame, scale: f64, vertex: Vertex) -> Vertex {
        Vertex {
            position: frame.model_to_world(vertex.position, scale),
            normal: frame.model_normal_to_world(vertex.normal),
            uv: vertex.uv,
        }
    }
}

fn lerp_count(a: usize, b: usize, t: f64) -> usize {
    (a as f64 + (b as f64 - a as f64) * t).round().max(1.0) as usize
}

#[derive(Debug, Clone, Default)]
pub struct WrappedGallery {
    surfaces: Vec<Option<WrappedSurface>>,
}

impl WrappedGallery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads one wrapped-surface file into the next id; a malformed file leaves it unloaded.
    pub fn load(&mut self, text: &str) -> Result<usize, WrappedSurfaceError> {
        let id = self.surfaces.len();
        match crate::parse::wrapped_file::parse_wrapped_surface(text) {
            Ok(surface) => {
                log::debug!(
                    "wrapped surface {id} `{}`: {}x{} net",
                    surface.name,
                    surface.rows,
                    surface.cols
                );
                self.surfaces.push(Some(surface));
                Ok(id)
            }
            Err(err) => {
                self.surfaces.push(None);
                Err(err)
            }
        }
    }

    pub fn push(&mut self, surface: WrappedSurface) -> usize {
        self.surfaces.push(Some(surface));
        self.surfaces.len() - 1
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&WrappedSurface> {
        self.surfaces.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut WrappedSurface> {
        self.surfaces.get_mut(id).and_then(Option::as_mut)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Tessellation grid of surface `id` at its resolution hint, cached per revision.
    #[must_use]
    pub fn grid(&self, id: usize, cache: &mut GridCache) -> Option<Arc<SurfaceGrid>> {
        let surface = self.get(id)?;
        let (u_div, v_div) = surface.resolution;
        let revision = surface.revision();
        cache.invalidate_wrapped_surface(id, revision);
        Some(cache.get_or_insert_grid(
            GridSource::Wrapped { surface: id, revision },
            u_div,
            v_div,
            || surface.grid(u_div, v_div),
        ))
    }
}
