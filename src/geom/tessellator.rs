//! Concave polygon tessellation.
//!
//! Input is an ordered ring of coplanar vertices. The ring is projected onto
//! its Newell plane, split into simple loops at every self-intersection (each
//! crossing synthesises a combined vertex with interpolated attributes), and
//! every loop is ear-clipped. Output triangles are wound to match the input
//! normal.

use super::core::{Tolerance, Vec3};
use super::mesh::Vertex;

/// Upper bound on vertices synthesised at self-intersections per polygon.
pub const MAX_COMBINED_VERTICES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum TessError {
    #[error("polygon needs at least 3 distinct vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon has no area")]
    Degenerate,
    #[error("polygon needs more than {} combined vertices", MAX_COMBINED_VERTICES)]
    CombineCapacity,
    #[error("failed to triangulate polygon loop (no ears found)")]
    NoEars,
}

/// Primitive type announced to a [`TessSink`] before its vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TessPrimitive {
    Triangles,
}

/// Receiver of begin/vertex/end callbacks from [`Tessellator::tessellate_with`].
pub trait TessSink {
    fn begin(&mut self, primitive: TessPrimitive);
    fn vertex(&mut self, vertex: &Vertex);
    fn end(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Uv {
    u: f64,
    v: f64,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    idx: u32,
    point: Uv,
    prev: usize,
    next: usize,
}

/// Tessellator with its own growable scratch state; one per pass.
#[derive(Debug, Default)]
pub struct Tessellator {
    vertices: Vec<Vertex>,
    projected: Vec<Uv>,
    nodes: Vec<Node>,
    triangles: Vec<[u32; 3]>,
    combined: usize,
}

impl Tessellator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Triangulates `polygon` and returns the triangles.
    pub fn tessellate(&mut self, polygon: &[Vertex]) -> Result<Vec<[Vertex; 3]>, TessError> {
        self.run(polygon)?;
        Ok(self
            .triangles
            .iter()
            .map(|t| t.map(|i| self.vertices[i as usize]))
            .collect())
    }

    /// Triangulates `polygon` and streams the triangles into `sink`.
    pub fn tessellate_with(
        &mut self,
        polygon: &[Vertex],
        sink: &mut impl TessSink,
    ) -> Result<(), TessError> {
        self.run(polygon)?;
        if self.triangles.is_empty() {
            return Ok(());
        }
        sink.begin(TessPrimitive::Triangles);
        for tri in &self.triangles {
            for &i in tri {
                sink.vertex(&self.vertices[i as usize]);
            }
        }
        sink.end();
        Ok(())
    }

    /// Vertices synthesised at self-intersections by the last call.
    #[must_use]
    pub fn combined_count(&self) -> usize {
        self.combined
    }

    fn run(&mut self, polygon: &[Vertex]) -> Result<(), TessError> {
        self.vertices.clear();
        self.projected.clear();
        self.triangles.clear();
        self.combined = 0;

        for v in polygon {
            if self.vertices.last().is_some_and(|last| last.position == v.position) {
                continue;
            }
            self.vertices.push(*v);
        }
        while self.vertices.len() > 1
            && self.vertices.first().map(|v| v.position) == self.vertices.last().map(|v| v.position)
        {
            self.vertices.pop();
        }
        if self.vertices.len() < 3 {
            return Err(TessError::TooFewVertices(self.vertices.len()));
        }

        let normal = newell_normal(&self.vertices).ok_or(TessError::Degenerate)?;
        let e_u = normal.any_orthogonal();
        let e_v = normal.cross(e_u);
        let origin = self.vertices[0].position;
        self.projected = self
            .vertices
            .iter()
            .map(|v| {
                let d = v.position - origin;
                Uv { u: d.dot(e_u), v: d.dot(e_v) }
            })
            .collect();

        let extent = self
            .projected
            .iter()
            .fold(0.0_f64, |m, p| m.max(p.u.abs()).max(p.v.abs()));
        let tol = Tolerance::DEFAULT.scaled(extent.max(f64::MIN_POSITIVE));

        let mut pending = vec![(0..self.vertices.len() as u32).collect::<Vec<u32>>()];
        while let Some(ring) = pending.pop() {
            match self.split_at_crossing(&ring, tol)? {
                Some((a, b)) => {
                    pending.push(a);
                    pending.push(b);
                }
                None => self.clip_loop(&ring, tol)?,
            }
        }
        Ok(())
    }

    /// Splits `ring` at its first proper self-intersection into two rings.
    fn split_at_crossing(
        &mut self,
        ring: &[u32],
        tol: Tolerance,
    ) -> Result<Option<(Vec<u32>, Vec<u32>)>, TessError> {
        let n = ring.len();
        if n < 4 {
            return Ok(None);
        }
        for i in 0..n {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            for j in i + 2..n {
                if (j + 1) % n == i {
                    continue;
                }
                let (c, d) = (ring[j], ring[(j + 1) % n]);
                let Some((t, s)) = self.crossing(a, b, c, d, tol) else {
                    continue;
                };

                if self.combined >= MAX_COMBINED_VERTICES {
                    return Err(TessError::CombineCapacity);
                }
                let x = self.combine(a, b, t, c, d, s);

                let mut first = vec![x];
                first.extend((i + 1..=j).map(|k| ring[k % n]));
                let mut second = vec![x];
                second.extend((j + 1..=i + n).map(|k| ring[k % n]));
                return Ok(Some((first, second)));
            }
        }
        Ok(None)
    }

    /// Parameters `(t, s)` of a proper crossing of segments `ab` and `cd`.
    fn crossing(&self, a: u32, b: u32, c: u32, d: u32, tol: Tolerance) -> Option<(f64, f64)> {
        if a == c || a == d || b == c || b == d {
            return None;
        }
        let (pa, pb) = (self.projected[a as usize], self.projected[b as usize]);
        let (pc, pd) = (self.projected[c as usize], self.projected[d as usize]);
        let o1 = orient2d(pa, pb, pc);
        let o2 = orient2d(pa, pb, pd);
        let o3 = orient2d(pc, pd, pa);
        let o4 = orient2d(pc, pd, pb);
        // Orientation values are areas; scale the length tolerance accordingly.
        let eps = tol.eps * tol.eps / Tolerance::DEFAULT.eps;
        if !((o1 > eps && o2 < -eps) || (o1 < -eps && o2 > eps)) {
            return None;
        }
        if !((o3 > eps && o4 < -eps) || (o3 < -eps && o4 > eps)) {
            return None;
        }
        let t = o3 / (o3 - o4);
        let s = o1 / (o1 - o2);
        Some((t, s))
    }

    /// Synthesises the crossing vertex; attributes are the weighted sum of the four endpoints.
    fn combine(&mut self, a: u32, b: u32, t: f64, c: u32, d: u32, s: f64) -> u32 {
        let weights = [(1.0 - t) * 0.5, t * 0.5, (1.0 - s) * 0.5, s * 0.5];
        let sources = [a, b, c, d].map(|i| self.vertices[i as usize]);
        let mut normal = Vec3::ZERO;
        let mut uv = [0.0, 0.0];
        for (w, v) in weights.iter().zip(&sources) {
            normal += v.normal * *w;
            uv[0] += v.uv[0] * w;
            uv[1] += v.uv[1] * w;
        }
        let position = sources[0].position.lerp(sources[1].position, t);
        let pa = self.projected[a as usize];
        let pb = self.projected[b as usize];

        self.vertices.push(Vertex {
            position,
            normal: normal.normalized_or(sources[0].normal),
            uv,
        });
        self.projected.push(Uv { u: pa.u + (pb.u - pa.u) * t, v: pa.v + (pb.v - pa.v) * t });
        self.combined += 1;
        (self.vertices.len() - 1) as u32
    }

    fn clip_loop(&mut self, ring: &[u32], tol: Tolerance) -> Result<(), TessError> {
        self.nodes.clear();
        let len = ring.len();
        for (i, &idx) in ring.iter().enumerate() {
            self.nodes.push(Node {
                idx,
                point: self.projected[idx as usize],
                prev: (i + len - 1) % len,
                next: (i + 1) % len,
            });
        }
        let Some(start) = filter_ring_points(0, &mut self.nodes, tol) else {
            // Zero-area loop (e.g. a touching spike); nothing to fill.
            return Ok(());
        };
        earclip_ring(start, &mut self.nodes, tol, &mut self.triangles)
    }
}

fn newell_normal(vertices: &[Vertex]) -> Option<Vec3> {
    let mut n = Vec3::ZERO;
    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        let (a, b) = (a.position, b.position);
        n += Vec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    n.normalized()
}

fn ring_len(start: usize, nodes: &[Node]) -> usize {
    let mut count = 0usize;
    let mut cur = start;
    loop {
        count += 1;
        cur = nodes[cur].next;
        if cur == start || count > nodes.len() {
            break;
        }
    }
    count
}

fn remove_node(node: usize, nodes: &mut [Node]) {
    let prev = nodes[node].prev;
    let next = nodes[node].next;
    nodes[prev].next = next;
    nodes[next].prev = prev;
}

/// Removes duplicate and collinear points; `None` when fewer than three remain.
fn filter_ring_points(start: usize, nodes: &mut [Node], tol: Tolerance) -> Option<usize> {
    if ring_len(start, nodes) < 3 {
        return None;
    }
    let mut start = start;
    let mut cur = start;
    let mut guard = 0usize;
    loop {
        guard += 1;
        if guard > nodes.len().saturating_mul(4).max(16) {
            break;
        }
        let prev = nodes[cur].prev;
        let next = nodes[cur].next;
        let (p, c, n) = (nodes[prev].point, nodes[cur].point, nodes[next].point);
        let dup = approx_eq_uv(p, c, tol) || approx_eq_uv(c, n, tol);
        if dup || distance_point_to_line_2d(p, c, n) <= tol.eps {
            if cur == start {
                start = next;
            }
            remove_node(cur, nodes);
            if ring_len(start, nodes) < 3 {
                return None;
            }
            cur = prev;
        } else {
            cur = next;
        }
        if cur == start {
            break;
        }
    }
    Some(start)
}

fn earclip_ring(
    start: usize,
    nodes: &mut [Node],
    tol: Tolerance,
    out: &mut Vec<[u32; 3]>,
) -> Result<(), TessError> {
    let mut start = start;
    let is_ccw = signed_area_ring(start, nodes) > 0.0;
    let mut remaining = ring_len(start, nodes);
    let mut ear = start;
    let mut stop = start;
    let mut passes_without_clip = 0usize;

    while remaining > 2 {
        let prev = nodes[ear].prev;
        let next = nodes[ear].next;
        if is_ear(prev, ear, next, nodes, is_ccw, tol) {
            // Always emit counter-clockwise in the projection plane.
            if is_ccw {
                out.push([nodes[prev].idx, nodes[ear].idx, nodes[next].idx]);
            } else {
                out.push([nodes[prev].idx, nodes[next].idx, nodes[ear].idx]);
            }
            if ear == start {
                start = next;
            }
            remove_node(ear, nodes);
            remaining -= 1;
            ear = next;
            stop = next;
            passes_without_clip = 0;
            continue;
        }

        ear = next;
        if ear == stop {
            passes_without_clip += 1;
            if passes_without_clip > 2 {
                return Err(TessError::NoEars);
            }
            start = match filter_ring_points(start, nodes, tol) {
                Some(start) => start,
                None => return Ok(()),
            };
            remaining = ring_len(start, nodes);
            ear = start;
            stop = start;
        }
    }
    Ok(())
}

fn is_ear(
    prev: usize,
    ear: usize,
    next: usize,
    nodes: &[Node],
    is_ccw: bool,
    tol: Tolerance,
) -> bool {
    let (a, b, c) = (nodes[prev].point, nodes[ear].point, nodes[next].point);
    if distance_point_to_line_2d(a, b, c) <= tol.eps {
        return false;
    }
    let cross = orient2d(a, b, c);
    if (is_ccw && cross <= 0.0) || (!is_ccw && cross >= 0.0) {
        return false;
    }

    let mut p = nodes[next].next;
    let mut guard = 0usize;
    while p != prev {
        guard += 1;
        if guard > nodes.len() {
            break;
        }
        let pt = nodes[p].point;
        if point_in_triangle(a, b, c, pt, is_ccw, tol)
            && !approx_eq_uv(pt, a, tol)
            && !approx_eq_uv(pt, c, tol)
        {
            return false;
        }
        p = nodes[p].next;
    }
    true
}

fn signed_area_ring(start: usize, nodes: &[Node]) -> f64 {
    let mut area = 0.0;
    let mut p = start;
    loop {
        let q = nodes[p].next;
        let (a, b) = (nodes[p].point, nodes[q].point);
        area += a.u * b.v - b.u * a.v;
        p = q;
        if p == start {
            break;
        }
    }
    0.5 * area
}

fn approx_eq_uv(a: Uv, b: Uv, tol: Tolerance) -> bool {
    (a.u - b.u).abs() <= tol.eps && (a.v - b.v).abs() <= tol.eps
}

fn orient2d(a: Uv, b: Uv, c: Uv) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

fn point_in_triangle(a: Uv, b: Uv, c: Uv, p: Uv, is_ccw: bool, tol: Tolerance) -> bool {
    let ab = orient2d(a, b, p);
    let bc = orient2d(b, c, p);
    let ca = orient2d(c, a, p);
    if is_ccw {
        ab >= -tol.eps && bc >= -tol.eps && ca >= -tol.eps
    } else {
        ab <= tol.eps && bc <= tol.eps && ca <= tol.eps
    }
}

/// Distance of `p` from the line through `a` and `b`.
fn distance_point_to_line_2d(a: Uv, p: Uv, b: Uv) -> f64 {
    let (dx, dy) = (b.u - a.u, b.v - a.v);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return (p.u - a.u).hypot(p.v - a.v);
    }
    ((p.u - a.u) * dy - (p.v - a.v) * dx).abs() / len
}
