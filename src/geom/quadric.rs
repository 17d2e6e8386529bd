//! Tessellated turtle primitives for backends without native quadrics.
//!
//! Outlines are wound counter-clockwise around their normal and strip rings
//! counter-clockwise around their axis, matching generalized cylinders.

use super::core::{Point3, Vec3};
use super::frame::OrientationFrame;
use super::mesh::Vertex;

/// Disc of `radius` in the heading/left plane, facing `up`.
#[must_use]
pub fn disc_outline(frame: &OrientationFrame, radius: f64, slices: usize) -> Vec<Vertex> {
    let slices = slices.max(3);
    (0..slices)
        .map(|k| {
            let (s, c) = (std::f64::consts::TAU * k as f64 / slices as f64).sin_cos();
            Vertex {
                position: frame.position + frame.heading * (c * radius) + frame.left * (s * radius),
                normal: frame.up,
                uv: [c * 0.5 + 0.5, s * 0.5 + 0.5],
            }
        })
        .collect()
}

/// Ring of `slices + 1` vertices (seam repeated) around `axis_point` in the left/up plane.
fn ring(
    frame: &OrientationFrame,
    centre: Point3,
    radius: f64,
    slices: usize,
    v: f64,
) -> Vec<Vertex> {
    let mut ring: Vec<Vertex> = (0..=slices)
        .map(|k| {
            let (s, c) = (std::f64::consts::TAU * k as f64 / slices as f64).sin_cos();
            let normal = frame.left * c + frame.up * s;
            Vertex { position: centre + normal * radius, normal, uv: [k as f64 / slices as f64, v] }
        })
        .collect();
    ring[slices].position = ring[0].position;
    ring[slices].normal = ring[0].normal;
    ring
}

/// Open cylinder of `radius` from the turtle position along `heading`.
#[must_use]
pub fn cylinder_rings(
    frame: &OrientationFrame,
    radius: f64,
    length: f64,
    slices: usize,
) -> (Vec<Vertex>, Vec<Vertex>) {
    let slices = slices.max(3);
    let end = frame.position + frame.heading * length;
    (
        ring(frame, frame.position, radius, slices, 0.0),
        ring(frame, end, radius, slices, 1.0),
    )
}

/// Latitude bands of a sphere centred at the turtle, from the `-heading` pole to `+heading`.
#[must_use]
pub fn sphere_bands(
    frame: &OrientationFrame,
    radius: f64,
    slices: usize,
) -> Vec<(Vec<Vertex>, Vec<Vertex>)> {
    let slices = slices.max(3);
    let stacks = (slices / 2).max(2);
    let rings: Vec<Vec<Vertex>> = (0..=stacks)
        .map(|j| {
            let theta = std::f64::consts::PI * j as f64 / stacks as f64;
            let (sin_t, cos_t) = theta.sin_cos();
            let mut ring = ring(
                frame,
                frame.position - frame.heading * (radius * cos_t),
                radius * sin_t,
                slices,
                j as f64 / stacks as f64,
            );
            for v in &mut ring {
                let radial = v.normal;
                v.normal = (radial * sin_t - frame.heading * cos_t).normalized_or(radial);
            }
            ring
        })
        .collect();
    rings.windows(2).map(|w| (w[0].clone(), w[1].clone())).collect()
}

/// Flat ribbon of half-width `half_width` along `heading`, facing `up`.
#[must_use]
pub fn ribbon(frame: &OrientationFrame, half_width: f64, length: f64) -> [Vertex; 4] {
    let side = frame.left * half_width;
    let along = frame.heading * length;
    let p = frame.position;
    [
        Vertex::new(p - side, frame.up, [0.0, 0.0]),
        Vertex::new(p + along - side, frame.up, [0.0, 1.0]),
        Vertex::new(p + along + side, frame.up, [1.0, 1.0]),
        Vertex::new(p + side, frame.up, [1.0, 0.0]),
    ]
}

/// Rhombus of `length` along `heading` and `width` along `left`, facing `up`.
#[must_use]
pub fn rhombus(frame: &OrientationFrame, length: f64, width: f64) -> Vec<Vertex> {
    let corner = |h: f64, l: f64| {
        Vertex::new(
            frame.local_to_world(h, l, 0.0),
            frame.up,
            [l / width.abs().max(f64::MIN_POSITIVE) + 0.5, h / length.abs().max(f64::MIN_POSITIVE)],
        )
    };
    vec![
        corner(0.0, 0.0),
        corner(length * 0.5, -width * 0.5),
        corner(length, 0.0),
        corner(length * 0.5, width * 0.5),
    ]
}

/// Isosceles triangle with its base at the turtle and apex `length` ahead.
#[must_use]
pub fn triangle(frame: &OrientationFrame, length: f64, width: f64) -> Vec<Vertex> {
    vec![
        Vertex::new(frame.local_to_world(0.0, -width * 0.5, 0.0), frame.up, [0.0, 0.0]),
        Vertex::new(frame.local_to_world(length, 0.0, 0.0), frame.up, [0.5, 1.0]),
        Vertex::new(frame.local_to_world(0.0, width * 0.5, 0.0), frame.up, [1.0, 0.0]),
    ]
}

/// Newell normal of a polygon outline.
#[must_use]
pub fn polygon_normal(outline: &[Vertex]) -> Option<Vec3> {
    let mut n = Vec3::ZERO;
    for (i, a) in outline.iter().enumerate() {
        let b = outline[(i + 1) % outline.len()].position;
        let a = a.position;
        n += Vec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    n.normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disc_winding_matches_up() {
        let frame = OrientationFrame::default();
        let disc = disc_outline(&frame, 2.0, 16);
        let n = polygon_normal(&disc).unwrap();
        assert!((n - frame.up).length() < 1e-9);
    }

    #[test]
    fn rhombus_and_triangle_face_up() {
        let mut frame = OrientationFrame::default();
        frame.turn(30.0);
        frame.pitch(10.0);
        for outline in [rhombus(&frame, 2.0, 1.0), triangle(&frame, 2.0, 1.0)] {
            let n = polygon_normal(&outline).unwrap();
            assert!((n - frame.up).length() < 1e-9);
        }
    }

    #[test]
    fn sphere_band_points_lie_on_the_sphere() {
        let frame = OrientationFrame::default();
        let bands = sphere_bands(&frame, 1.5, 12);
        assert_eq!(bands.len(), 6);
        for (a, b) in &bands {
            for v in a.iter().chain(b) {
                assert!((v.position.to_vec3().length() - 1.5).abs() < 1e-9);
                assert!((v.normal.dot(v.position.to_vec3()) - 1.5).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn cylinder_rings_share_seams() {
        let frame = OrientationFrame::default();
        let (a, b) = cylinder_rings(&frame, 0.5, 3.0, 8);
        assert_eq!(a.len(), 9);
        assert_eq!(a[0].position, a[8].position);
        assert!((b[0].position - a[0].position - frame.heading * 3.0).length() < 1e-12);
    }
}
