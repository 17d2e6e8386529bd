//! Uniform B-spline evaluation shared by contours and wrapped surfaces.

use super::core::Point3;

pub(crate) const CUBIC: usize = 3;

/// Knot vector of a clamped uniform B-spline on `[0, 1]`.
pub(crate) fn clamped_uniform_knots(count: usize, degree: usize) -> Vec<f64> {
    let degree = degree.min(count.saturating_sub(1)).max(1);
    let inner = count.saturating_sub(degree + 1);
    let mut knots = Vec::with_capacity(count + degree + 1);
    knots.extend(std::iter::repeat_n(0.0, degree + 1));
    for i in 1..=inner {
        knots.push(i as f64 / (inner + 1) as f64);
    }
    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    knots
}

pub(crate) fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

pub(crate) fn de_boor(d: &mut [Point3], span: usize, p: usize, u: f64, knots: &[f64]) {
    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            d[j] = d[j - 1].lerp(d[j], alpha);
        }
    }
}

/// Evaluates a clamped uniform B-spline of `degree` over `points` at `u` in `[0, 1]`.
///
/// The degree drops automatically when there are too few control points.
pub(crate) fn eval_clamped(points: &[Point3], degree: usize, u: f64) -> Point3 {
    match points.len() {
        0 => Point3::ORIGIN,
        1 => points[0],
        count => {
            let p = degree.min(count - 1).max(1);
            let knots = clamped_uniform_knots(count, p);
            let u = u.clamp(0.0, 1.0);
            let span = find_span(count - 1, p, u, &knots);
            let mut d: Vec<Point3> = (0..=p).map(|j| points[span - p + j]).collect();
            de_boor(&mut d, span, p, u, &knots);
            d[p]
        }
    }
}

/// Evaluates a closed (periodic) uniform cubic B-spline at `u` in `[0, 1)`;
/// `u` wraps around.
pub(crate) fn eval_periodic(points: &[Point3], u: f64) -> Point3 {
    let count = points.len();
    if count < 3 {
        return eval_clamped(points, 1, u.rem_euclid(1.0));
    }
    // Uniform knots 0..count+2p; the periodic domain is [p, p + count].
    let p = CUBIC;
    let extended: Vec<Point3> = (0..count + p).map(|i| points[i % count]).collect();
    let knots: Vec<f64> = (0..extended.len() + p + 1).map(|i| i as f64).collect();
    let t = p as f64 + u.rem_euclid(1.0) * count as f64;
    let span = find_span(extended.len() - 1, p, t, &knots);
    let mut d: Vec<Point3> = (0..=p).map(|j| extended[span - p + j]).collect();
    de_boor(&mut d, span, p, t, &knots);
    d[p]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_spline_interpolates_end_points() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(3.0, 2.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(5.0, -1.0, 0.0),
        ];
        assert_eq!(eval_clamped(&pts, 3, 0.0), pts[0]);
        let end = eval_clamped(&pts, 3, 1.0);
        assert!(end.distance_to(pts[4]) < 1e-12);
    }

    #[test]
    fn periodic_spline_wraps_around() {
        let pts = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
        ];
        let a = eval_periodic(&pts, 0.0);
        let b = eval_periodic(&pts, 1.0);
        assert!(a.distance_to(b) < 1e-12);
    }
}
