//! Generalized cylinders.
//!
//! [`CylinderEngine`] is the per-pass state machine behind StartGC / PointGC /
//! EndGC. It captures cross-sections (turtle frame + contour) and turns each
//! pair of consecutive captures into a lateral strip; caps close the ends.
//! The engine only produces geometry ([`GcPiece`]); backends decide how to
//! write it.

use super::contour::{Contour, ContourGallery};
use super::core::{Point3, Quat, Tolerance, Vec3};
use super::frame::OrientationFrame;
use super::mesh::Vertex;
use super::tessellator::Tessellator;

#[derive(Debug, thiserror::Error)]
pub enum GcError {
    #[error("generalized cylinder already started")]
    AlreadyActive,
    #[error("no generalized cylinder is active")]
    NotActive,
    #[error("invalid contour id {0}")]
    InvalidContour(usize),
}

/// Turtle state captured at a StartGC / PointGC / EndGC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcSection {
    pub frame: OrientationFrame,
    pub contour: usize,
    pub contour2: usize,
    pub blend: f64,
    /// Explicit normal override.
    pub normal: Option<Vec3>,
    /// Turtle division override.
    pub divisions: Option<usize>,
}

impl GcSection {
    #[must_use]
    pub fn new(frame: OrientationFrame, contour: usize) -> Self {
        Self { frame, contour, contour2: contour, blend: 0.0, normal: None, divisions: None }
    }
}

/// Pass-wide options the engine reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcSettings {
    pub default_divisions: usize,
    pub tapered: bool,
    pub capped: bool,
    pub concave_caps: bool,
}

impl Default for GcSettings {
    fn default() -> Self {
        Self {
            default_divisions: super::contour::DEFAULT_DIVISIONS,
            tapered: false,
            capped: false,
            concave_caps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GcPiece {
    /// Lateral surface: quad `i` joins `begin[i], begin[i + 1], end[i + 1], end[i]`.
    Strip { begin: Vec<Vertex>, end: Vec<Vertex> },
    Cap { triangles: Vec<[Vertex; 3]> },
}

impl GcPiece {
    #[must_use]
    pub fn quad_count(&self) -> usize {
        match self {
            Self::Strip { begin, .. } => begin.len().saturating_sub(1),
            Self::Cap { .. } => 0,
        }
    }

    /// Every vertex of the piece.
    pub fn vertices(&self) -> Box<dyn Iterator<Item = &Vertex> + '_> {
        match self {
            Self::Strip { begin, end } => Box::new(begin.iter().chain(end)),
            Self::Cap { triangles } => Box::new(triangles.iter().flatten()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Captured {
    section: GcSection,
    tex_v: f64,
}

#[derive(Debug, Default)]
pub struct CylinderEngine {
    captured: Option<Captured>,
    /// Branches opened since the current tube started.
    branch_depth: usize,
}

impl CylinderEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.captured.is_some()
    }

    /// The cross-section the next strip starts from.
    #[must_use]
    pub fn captured(&self) -> Option<&GcSection> {
        self.captured.as_ref().map(|c| &c.section)
    }

    #[must_use]
    pub fn is_branch_pending(&self) -> bool {
        self.branch_depth > 0
    }

    /// While a branch is open, StartGC implicitly ends the current tube.
    pub fn start_branch(&mut self) {
        self.branch_depth += 1;
    }

    /// Closes the innermost open branch.
    pub fn end_branch(&mut self) {
        self.branch_depth = self.branch_depth.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.captured = None;
        self.branch_depth = 0;
    }

    pub fn start(
        &mut self,
        contours: &ContourGallery,
        section: GcSection,
        settings: &GcSettings,
        tess: &mut Tessellator,
    ) -> Result<Vec<GcPiece>, GcError> {
        check_contours(contours, &section)?;
        let mut pieces = Vec::new();
        if self.is_active() {
            if !self.is_branch_pending() {
                return Err(GcError::AlreadyActive);
            }
            pieces = self.end(contours, section, settings, tess)?;
        }
        self.branch_depth = 0;

        if settings.capped {
            let divisions = resolve_divisions(contours, &section, settings);
            let contour =
                contours.cross_section(section.contour, section.contour2, section.blend, divisions);
            let ring = ring(&contour, &section, 0.0);
            pieces.extend(cap(&ring, &contour, -section.frame.heading, true, settings, tess));
        }
        self.captured = Some(Captured { section, tex_v: 0.0 });
        Ok(pieces)
    }

    pub fn point(
        &mut self,
        contours: &ContourGallery,
        section: GcSection,
        settings: &GcSettings,
    ) -> Result<Vec<GcPiece>, GcError> {
        let begin = self.captured.ok_or(GcError::NotActive)?;
        check_contours(contours, &section)?;
        let (strip, tex_v) = strip(contours, &begin, &section, settings);
        self.captured = Some(Captured { section, tex_v });
        Ok(strip.into_iter().collect())
    }

    pub fn end(
        &mut self,
        contours: &ContourGallery,
        section: GcSection,
        settings: &GcSettings,
        tess: &mut Tessellator,
    ) -> Result<Vec<GcPiece>, GcError> {
        let begin = self.captured.ok_or(GcError::NotActive)?;
        check_contours(contours, &section)?;
        let (strip, tex_v) = strip(contours, &begin, &section, settings);
        let mut pieces: Vec<GcPiece> = strip.into_iter().collect();
        if settings.capped {
            let divisions = resolve_divisions(contours, &section, settings);
            let contour =
                contours.cross_section(section.contour, section.contour2, section.blend, divisions);
            let ring = ring(&contour, &section, tex_v);
            pieces.extend(cap(&ring, &contour, section.frame.heading, false, settings, tess));
        }
        self.captured = None;
        Ok(pieces)
    }
}

fn check_contours(contours: &ContourGallery, section: &GcSection) -> Result<(), GcError> {
    for id in [section.contour, section.contour2] {
        if !contours.is_valid(id) {
            return Err(GcError::InvalidContour(id));
        }
    }
    Ok(())
}

/// Turtle override, else the contour's own count when specified, else the global default.
fn resolve_divisions(
    contours: &ContourGallery,
    section: &GcSection,
    settings: &GcSettings,
) -> usize {
    section.divisions.unwrap_or_else(|| {
        let contour = contours.get(section.contour);
        if contour.is_specified() { contour.divisions() } else { settings.default_divisions }
    })
}

fn ring(contour: &Contour, section: &GcSection, tex_v: f64) -> Vec<Vertex> {
    let frame = &section.frame;
    let rotation = section.normal.and_then(|n| Quat::from_rotation_arc(frame.up, n));
    let last = contour.divisions().saturating_sub(1).max(1) as f64;
    contour
        .samples()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut normal = frame.cross_section_normal(s.normal.x, s.normal.y);
            if let Some(q) = rotation {
                normal = q.rotate(normal);
            }
            Vertex {
                position: frame.cross_section_point(s.vertex.x, s.vertex.y),
                normal,
                uv: [i as f64 / last, tex_v],
            }
        })
        .collect()
}

fn strip(
    contours: &ContourGallery,
    begin: &Captured,
    end: &GcSection,
    settings: &GcSettings,
) -> (Option<GcPiece>, f64) {
    let from = &begin.section;
    let length = from.frame.position.distance_to(end.frame.position);
    if length <= Tolerance::ZERO_LENGTH.eps {
        return (None, begin.tex_v);
    }
    let radius = from.frame.scale.p.abs();
    let tex_v = begin.tex_v + if radius > 0.0 { length / (2.0 * radius) } else { length };

    let divisions =
        resolve_divisions(contours, from, settings).max(resolve_divisions(contours, end, settings));
    let c_begin = contours.cross_section(from.contour, from.contour2, from.blend, divisions);
    let c_end = contours.cross_section(end.contour, end.contour2, end.blend, divisions);
    let mut ring_begin = ring(&c_begin, from, begin.tex_v);
    let mut ring_end = ring(&c_end, end, tex_v);
    if settings.tapered {
        taper_normals(&mut ring_begin, &mut ring_end, &c_begin);
    }
    (Some(GcPiece::Strip { begin: ring_begin, end: ring_end }), tex_v)
}

/// Replaces contour normals with normals of the actual (tapered) strip surface.
fn taper_normals(begin: &mut [Vertex], end: &mut [Vertex], contour: &Contour) {
    let b: Vec<Point3> = begin.iter().map(|v| v.position).collect();
    let e: Vec<Point3> = end.iter().map(|v| v.position).collect();
    for i in 0..b.len().min(e.len()) {
        let j = contour.next_index(i);
        if j == i {
            continue;
        }
        let nb = (b[j] - b[i]).cross(e[i] - b[i]);
        begin[i].normal = oriented(nb, begin[i].normal);
        let ne = (e[j] - e[i]).cross(e[i] - b[i]);
        end[i].normal = oriented(ne, end[i].normal);
    }
}

fn oriented(candidate: Vec3, reference: Vec3) -> Vec3 {
    match candidate.normalized() {
        Some(n) if n.dot(reference) < 0.0 => -n,
        Some(n) => n,
        None => reference,
    }
}

/// Cap over `ring` facing `normal`; `reverse` flips the ring order so the winding follows.
fn cap(
    ring: &[Vertex],
    contour: &Contour,
    normal: Vec3,
    reverse: bool,
    settings: &GcSettings,
    tess: &mut Tessellator,
) -> Option<GcPiece> {
    if !contour.is_closed() || ring.len() < 4 {
        return None;
    }
    let count = ring.len() - 1;
    let mut outline: Vec<Vertex> = ring[..count]
        .iter()
        .zip(contour.samples())
        .map(|(v, s)| Vertex {
            position: v.position,
            normal,
            uv: [s.vertex.x * 0.5 + 0.5, s.vertex.y * 0.5 + 0.5],
        })
        .collect();
    if reverse {
        outline.reverse();
    }

    if settings.concave_caps {
        match tess.tessellate(&outline) {
            Ok(triangles) => return Some(GcPiece::Cap { triangles }),
            Err(err) => log::warn!("cap tessellation failed, using a fan: {err}"),
        }
    }
    Some(GcPiece::Cap { triangles: fan(&outline, normal) })
}

fn fan(outline: &[Vertex], normal: Vec3) -> Vec<[Vertex; 3]> {
    let n = outline.len() as f64;
    let sum = outline.iter().fold(Vec3::ZERO, |acc, v| acc + v.position.to_vec3());
    let uv_sum = outline.iter().fold([0.0, 0.0], |acc, v| [acc[0] + v.uv[0], acc[1] + v.uv[1]]);
    let centre = Vertex {
        position: Point3::ORIGIN + sum / n,
        normal,
        uv: [uv_sum[0] / n, uv_sum[1] / n],
    };
    (0..outline.len())
        .map(|k| [centre, outline[k], outline[(k + 1) % outline.len()]])
        .collect()
}
