//! Turtle orientation frame.
//!
//! The frame follows the usual L-system convention: `heading`, `left` and `up`
//! form a right-handed orthonormal basis with `heading × left = up`. The
//! default turtle stands at the origin pointing along +Y with `up` = +Z.

use super::core::{Point3, Transform, Vec3};

/// Cross-section radii of the turtle, measured along `left` (p) and `up` (q).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthScale {
    pub p: f64,
    pub q: f64,
}

impl WidthScale {
    #[must_use]
    pub const fn uniform(radius: f64) -> Self {
        Self { p: radius, q: radius }
    }

    #[must_use]
    pub fn is_uniform(self) -> bool {
        self.p == self.q
    }

    /// Largest of the two radii, used for worst-case bounds.
    #[must_use]
    pub fn max_radius(self) -> f64 {
        self.p.abs().max(self.q.abs())
    }

    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self { p: self.p + (rhs.p - self.p) * t, q: self.q + (rhs.q - self.q) * t }
    }
}

impl Default for WidthScale {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationFrame {
    pub position: Point3,
    pub heading: Vec3,
    pub left: Vec3,
    pub up: Vec3,
    pub scale: WidthScale,
}

impl Default for OrientationFrame {
    fn default() -> Self {
        Self {
            position: Point3::ORIGIN,
            heading: Vec3::Y,
            left: -Vec3::X,
            up: Vec3::Z,
            scale: WidthScale::default(),
        }
    }
}

impl OrientationFrame {
    pub fn move_forward(&mut self, distance: f64) {
        self.position = self.position + self.heading * distance;
    }

    /// Rotates `heading` towards `left` around `up` (`+` in turtle notation).
    pub fn turn(&mut self, degrees: f64) {
        let (s, c) = degrees.to_radians().sin_cos();
        let h = self.heading;
        let l = self.left;
        self.heading = h * c + l * s;
        self.left = l * c - h * s;
    }

    /// Rotates `heading` towards `-up` around `left` (`&` in turtle notation).
    pub fn pitch(&mut self, degrees: f64) {
        let (s, c) = degrees.to_radians().sin_cos();
        let h = self.heading;
        let u = self.up;
        self.heading = h * c - u * s;
        self.up = h * s + u * c;
    }

    /// Rotates `left` towards `up` around `heading` (`/` in turtle notation).
    pub fn roll(&mut self, degrees: f64) {
        let (s, c) = degrees.to_radians().sin_cos();
        let l = self.left;
        let u = self.up;
        self.left = l * c + u * s;
        self.up = u * c - l * s;
    }

    pub fn turn_around(&mut self) {
        self.heading = -self.heading;
        self.left = -self.left;
    }

    /// Rolls around `heading` until `left` is horizontal with respect to `world_up`.
    ///
    /// Does nothing when the heading is parallel to `world_up`.
    pub fn roll_to_horizontal(&mut self, world_up: Vec3) {
        if let Some(left) = world_up.cross(self.heading).normalized() {
            self.left = left;
            self.up = self.heading.cross(left);
        }
    }

    /// Points the heading along `direction`, keeping the frame as close to the
    /// current one as possible.
    pub fn set_heading(&mut self, direction: Vec3) {
        let Some(heading) = direction.normalized() else {
            return;
        };
        let left = self.up.cross(heading).normalized().unwrap_or_else(|| heading.any_orthogonal());
        self.heading = heading;
        self.left = left;
        self.up = heading.cross(left);
    }

    /// Re-orthonormalises the basis after accumulated rotations (Gram-Schmidt on heading, left).
    pub fn orthonormalize(&mut self) {
        let heading = self.heading.normalized_or(Vec3::Y);
        let left = (self.left - heading * self.left.dot(heading))
            .normalized()
            .unwrap_or_else(|| heading.any_orthogonal());
        self.heading = heading;
        self.left = left;
        self.up = heading.cross(left);
    }

    pub fn set_width(&mut self, width: f64) {
        self.scale = WidthScale::uniform(width * 0.5);
    }

    /// Point of the cross-section plane, `(x, y)` scaled by (p, q) along (left, up).
    #[must_use]
    pub fn cross_section_point(&self, x: f64, y: f64) -> Point3 {
        self.position + self.left * (x * self.scale.p) + self.up * (y * self.scale.q)
    }

    /// Normal of a cross-section sample under the non-uniform (p, q) scale.
    #[must_use]
    pub fn cross_section_normal(&self, nx: f64, ny: f64) -> Vec3 {
        (self.left * (nx * self.scale.q) + self.up * (ny * self.scale.p))
            .normalized_or(self.left)
    }

    /// Local-to-world transform with local X = left, Y = up, Z = heading.
    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform::from_axes(self.position, self.left, self.up, self.heading)
    }

    /// Maps a point given in (heading, left, up) coordinates into world space.
    #[must_use]
    pub fn local_to_world(&self, h: f64, l: f64, u: f64) -> Point3 {
        self.position + self.heading * h + self.left * l + self.up * u
    }

    /// Maps model coordinates (x to the right, y forward, z up) into world space.
    #[must_use]
    pub fn model_to_world(&self, p: Point3, scale: f64) -> Point3 {
        self.local_to_world(p.y * scale, -p.x * scale, p.z * scale)
    }

    /// Rotates a model-space normal with [`OrientationFrame::model_to_world`].
    #[must_use]
    pub fn model_normal_to_world(&self, n: Vec3) -> Vec3 {
        (self.heading * n.y - self.left * n.x + self.up * n.z).normalized_or(self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Tolerance;

    fn assert_orthonormal(frame: &OrientationFrame) {
        let tol = Tolerance::new(1e-9);
        assert!(tol.approx_eq_f64(frame.heading.length(), 1.0));
        assert!(tol.approx_eq_f64(frame.left.length(), 1.0));
        assert!(tol.approx_eq_f64(frame.up.length(), 1.0));
        assert!(tol.approx_eq_vec3(frame.heading.cross(frame.left), frame.up));
    }

    #[test]
    fn default_frame_is_right_handed() {
        assert_orthonormal(&OrientationFrame::default());
    }

    #[test]
    fn rotations_keep_the_basis_orthonormal() {
        let mut frame = OrientationFrame::default();
        frame.turn(33.0);
        frame.pitch(-71.0);
        frame.roll(12.5);
        frame.turn_around();
        assert_orthonormal(&frame);
    }

    #[test]
    fn turn_moves_heading_towards_left() {
        let mut frame = OrientationFrame::default();
        let left = frame.left;
        frame.turn(90.0);
        assert!(Tolerance::new(1e-12).approx_eq_vec3(frame.heading, left));
    }

    #[test]
    fn roll_to_horizontal_levels_left() {
        let mut frame = OrientationFrame::default();
        frame.pitch(30.0);
        frame.roll(40.0);
        frame.roll_to_horizontal(Vec3::Y);
        assert!(frame.left.dot(Vec3::Y).abs() < 1e-12);
        assert_orthonormal(&frame);
    }

    #[test]
    fn cross_section_uses_both_radii() {
        let mut frame = OrientationFrame::default();
        frame.scale = WidthScale { p: 2.0, q: 0.5 };
        let p = frame.cross_section_point(1.0, 1.0);
        assert_eq!(p, Point3::new(-2.0, 0.0, 0.5));
    }
}
