//! Cross-section contours for generalized cylinders.
//!
//! A contour is a closed (or open) 2D curve in the turtle's (left, up) plane,
//! sampled into `divisions` ordered (vertex, normal) pairs. For closed
//! contours the last sample is the seam: it repeats the position of sample 0
//! so a ring of N samples has N-1 lateral edges that cover the whole loop.

use std::borrow::Cow;

use super::bspline::{CUBIC, eval_clamped, eval_periodic};
use super::core::{Point3, Vec3};

pub const MIN_DIVISIONS: usize = 2;
pub const MAX_DIVISIONS: usize = 64;
pub const DEFAULT_DIVISIONS: usize = 8;

/// Parameter step used for the finite-difference tangent.
const TANGENT_STEP: f64 = 1e-4;

#[derive(Debug, thiserror::Error)]
pub enum ContourError {
    #[error("contour file line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("contour `{name}` needs at least {min} control points, got {count}")]
    TooFewPoints { name: String, min: usize, count: usize },
    #[error("contour file contains no contours")]
    Empty,
    #[error("cannot blend contours with {first} and {second} divisions")]
    DivisionMismatch { first: usize, second: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourSample {
    pub vertex: Point3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourKind {
    #[default]
    Closed,
    Open,
}

/// What a contour is sampled from; kept so the contour can be re-sampled.
#[derive(Debug, Clone, PartialEq)]
enum ContourSource {
    Circle,
    Spline { kind: ContourKind, control_points: Vec<Point3> },
    /// A runtime blend; re-sampling falls back to piecewise-linear interpolation.
    Samples,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    name: String,
    source: ContourSource,
    samples: Vec<ContourSample>,
    specified: bool,
    min: Point3,
    max: Point3,
}

impl Contour {
    /// Unit circle, the built-in contour 0.
    #[must_use]
    pub fn circle(divisions: usize) -> Self {
        let mut contour = Self {
            name: "circle".to_owned(),
            source: ContourSource::Circle,
            samples: Vec::new(),
            specified: false,
            min: Point3::ORIGIN,
            max: Point3::ORIGIN,
        };
        contour.resample(divisions);
        contour
    }

    /// Contour sampled from a cubic B-spline control polygon.
    ///
    /// `divisions` is the user-specified sample count; `None` leaves the
    /// contour at the default count and unspecified.
    pub fn from_control_points(
        name: impl Into<String>,
        kind: ContourKind,
        control_points: Vec<Point3>,
        divisions: Option<usize>,
    ) -> Result<Self, ContourError> {
        let name = name.into();
        let min = match kind {
            ContourKind::Closed => 3,
            ContourKind::Open => 2,
        };
        if control_points.len() < min {
            return Err(ContourError::TooFewPoints { name, min, count: control_points.len() });
        }
        let mut contour = Self {
            name,
            source: ContourSource::Spline { kind, control_points },
            samples: Vec::new(),
            specified: divisions.is_some(),
            min: Point3::ORIGIN,
            max: Point3::ORIGIN,
        };
        contour.resample(divisions.unwrap_or(DEFAULT_DIVISIONS));
        Ok(contour)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn divisions(&self) -> usize {
        self.samples.len()
    }

    /// Whether the division count came from the contour file rather than the default.
    #[must_use]
    pub fn is_specified(&self) -> bool {
        self.specified
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !matches!(
            self.source,
            ContourSource::Spline { kind: ContourKind::Open, .. }
        )
    }

    #[must_use]
    pub fn samples(&self) -> &[ContourSample] {
        &self.samples
    }

    #[must_use]
    pub fn vertex(&self, index: usize) -> Point3 {
        self.samples[index].vertex
    }

    #[must_use]
    pub fn normal(&self, index: usize) -> Vec3 {
        self.samples[index].normal
    }

    /// Bounding min/max of the samples.
    #[must_use]
    pub fn bounds(&self) -> (Point3, Point3) {
        (self.min, self.max)
    }

    /// Largest distance of any sample from the contour origin.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.vertex.to_vec3().length())
            .fold(0.0, f64::max)
    }

    /// Index of the in-ring neighbour of `index`, skipping the seam duplicate.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        let n = self.samples.len();
        if index + 1 < n {
            index + 1
        } else if self.is_closed() && n > 2 {
            1
        } else {
            index.saturating_sub(1)
        }
    }

    /// Re-samples to `divisions`, clamped to `[MIN_DIVISIONS, MAX_DIVISIONS]`.
    pub fn set_divisions(&mut self, divisions: usize) {
        self.resample(divisions);
    }

    /// This contour at `divisions` samples, borrowed when already there.
    #[must_use]
    pub fn with_divisions(&self, divisions: usize) -> Cow<'_, Contour> {
        let divisions = clamp_divisions(divisions);
        if divisions == self.divisions() {
            Cow::Borrowed(self)
        } else {
            let mut copy = self.clone();
            copy.resample(divisions);
            Cow::Owned(copy)
        }
    }

    /// Sample-wise linear blend of two contours with equal division counts.
    pub fn blend(first: &Self, second: &Self, t: f64) -> Result<Self, ContourError> {
        if first.divisions() != second.divisions() {
            return Err(ContourError::DivisionMismatch {
                first: first.divisions(),
                second: second.divisions(),
            });
        }
        let samples = first
            .samples
            .iter()
            .zip(&second.samples)
            .map(|(a, b)| ContourSample {
                vertex: a.vertex.lerp(b.vertex, t),
                normal: a.normal.lerp(b.normal, t).normalized_or(a.normal),
            })
            .collect();
        let mut blended = Self {
            name: format!("{}~{}", first.name, second.name),
            source: ContourSource::Samples,
            samples,
            specified: first.specified || second.specified,
            min: Point3::ORIGIN,
            max: Point3::ORIGIN,
        };
        blended.update_bounds();
        Ok(blended)
    }

    fn resample(&mut self, divisions: usize) {
        let n = clamp_divisions(divisions);
        let samples = match &self.source {
            ContourSource::Circle => sample_circle(n),
            ContourSource::Spline { kind, control_points } => {
                sample_spline(*kind, control_points, n)
            }
            ContourSource::Samples => resample_polyline(&self.samples, n),
        };
        self.samples = samples;
        self.update_bounds();
    }

    fn update_bounds(&mut self) {
        let mut iter = self.samples.iter().map(|s| s.vertex);
        let Some(first) = iter.next() else {
            return;
        };
        let (min, max) = iter.fold((first, first), |(lo, hi), p| {
            (
                Point3::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Point3::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        });
        self.min = min;
        self.max = max;
    }
}

fn clamp_divisions(divisions: usize) -> usize {
    divisions.clamp(MIN_DIVISIONS, MAX_DIVISIONS)
}

fn sample_circle(n: usize) -> Vec<ContourSample> {
    let mut samples: Vec<ContourSample> = (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / (n - 1) as f64;
            let (s, c) = angle.sin_cos();
            ContourSample { vertex: Point3::new(c, s, 0.0), normal: Vec3::new(c, s, 0.0) }
        })
        .collect();
    samples[n - 1] = samples[0];
    samples
}

fn sample_spline(kind: ContourKind, control_points: &[Point3], n: usize) -> Vec<ContourSample> {
    let eval = |u: f64| match kind {
        ContourKind::Closed => eval_periodic(control_points, u),
        ContourKind::Open => eval_clamped(control_points, CUBIC, u),
    };

    let mut samples: Vec<ContourSample> = (0..n)
        .map(|i| {
            let u = i as f64 / (n - 1) as f64;
            let (u0, u1) = match kind {
                ContourKind::Closed => (u - TANGENT_STEP, u + TANGENT_STEP),
                ContourKind::Open => ((u - TANGENT_STEP).max(0.0), (u + TANGENT_STEP).min(1.0)),
            };
            let tangent = eval(u1) - eval(u0);
            // Tangent rotated clockwise: outward for counter-clockwise contours.
            let normal = Vec3::new(tangent.y, -tangent.x, 0.0).normalized_or(Vec3::X);
            ContourSample { vertex: eval(u), normal }
        })
        .collect();

    if kind == ContourKind::Closed {
        samples[n - 1] = samples[0];
    }
    samples
}

/// Piecewise-linear re-sampling by arc length, used for blended contours.
fn resample_polyline(samples: &[ContourSample], n: usize) -> Vec<ContourSample> {
    if samples.len() < 2 {
        return vec![samples.first().copied().unwrap_or(ContourSample {
            vertex: Point3::ORIGIN,
            normal: Vec3::X,
        }); n];
    }
    let mut cumulative = Vec::with_capacity(samples.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for pair in samples.windows(2) {
        total += pair[0].vertex.distance_to(pair[1].vertex);
        cumulative.push(total);
    }
    if total <= 0.0 {
        return vec![samples[0]; n];
    }

    let mut segment = 0;
    (0..n)
        .map(|i| {
            let target = total * i as f64 / (n - 1) as f64;
            while segment + 2 < cumulative.len() && cumulative[segment + 1] < target {
                segment += 1;
            }
            let len = cumulative[segment + 1] - cumulative[segment];
            let t = if len > 0.0 { ((target - cumulative[segment]) / len).clamp(0.0, 1.0) } else { 0.0 };
            let a = samples[segment];
            let b = samples[segment + 1];
            ContourSample {
                vertex: a.vertex.lerp(b.vertex, t),
                normal: a.normal.lerp(b.normal, t).normalized_or(a.normal),
            }
        })
        .collect()
}

/// Contour gallery: id 0 is the built-in circle, loaded contours follow.
#[derive(Debug, Clone)]
pub struct ContourGallery {
    contours: Vec<Contour>,
}

impl Default for ContourGallery {
    fn default() -> Self {
        Self { contours: vec![Contour::circle(DEFAULT_DIVISIONS)] }
    }
}

impl ContourGallery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the loaded contours with the ones in `text`.
    ///
    /// Nothing changes when the file is malformed.
    pub fn load(&mut self, text: &str) -> Result<usize, ContourError> {
        let loaded = crate::parse::contour_file::parse_contours(text)?;
        if loaded.is_empty() {
            return Err(ContourError::Empty);
        }
        let count = loaded.len();
        self.contours.truncate(1);
        self.contours.extend(loaded);
        log::debug!("loaded {count} contours");
        Ok(count)
    }

    /// Appends one contour and returns its id.
    pub fn push(&mut self, contour: Contour) -> usize {
        self.contours.push(contour);
        self.contours.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    #[must_use]
    pub fn is_valid(&self, id: usize) -> bool {
        id < self.contours.len()
    }

    /// # Panics
    /// On an invalid id; callers validate ids with [`ContourGallery::is_valid`].
    #[must_use]
    pub fn get(&self, id: usize) -> &Contour {
        assert!(self.is_valid(id), "invalid contour id {id}");
        &self.contours[id]
    }

    /// # Panics
    /// On an invalid id.
    pub fn get_access(&mut self, id: usize) -> &mut Contour {
        assert!(self.is_valid(id), "invalid contour id {id}");
        &mut self.contours[id]
    }

    #[must_use]
    pub fn try_get(&self, id: usize) -> Option<&Contour> {
        self.contours.get(id)
    }

    /// Blend of contours `first` and `second`; the inputs themselves at blend 0 and 1.
    ///
    /// # Panics
    /// On invalid ids.
    pub fn get_blended(
        &self,
        first: usize,
        second: usize,
        blend: f64,
    ) -> Result<Cow<'_, Contour>, ContourError> {
        let a = self.get(first);
        if blend <= 0.0 || first == second {
            return Ok(Cow::Borrowed(a));
        }
        let b = self.get(second);
        if blend >= 1.0 {
            return Ok(Cow::Borrowed(b));
        }
        Contour::blend(a, b, blend).map(Cow::Owned)
    }

    /// The cross-section for a generalized cylinder: both inputs are brought
    /// to `divisions` samples before blending.
    ///
    /// # Panics
    /// On invalid ids.
    #[must_use]
    pub fn cross_section(
        &self,
        first: usize,
        second: usize,
        blend: f64,
        divisions: usize,
    ) -> Cow<'_, Contour> {
        let a = self.get(first);
        let a = a.with_divisions(divisions);
        if blend <= 0.0 || first == second {
            return a;
        }
        let b = self.get(second).with_divisions(divisions);
        if blend >= 1.0 {
            return b;
        }
        match Contour::blend(&a, &b, blend) {
            Ok(blended) => Cow::Owned(blended),
            // Unreachable after synchronising divisions; keep the first contour.
            Err(_) => a,
        }
    }

    /// Re-samples contour `id`.
    ///
    /// # Panics
    /// On an invalid id.
    pub fn set_divisions(&mut self, id: usize, divisions: usize) {
        self.get_access(id).set_divisions(divisions);
    }
}
