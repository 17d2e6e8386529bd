use crate::geom::{
    MAX_COMBINED_VERTICES, Point3, TessError, TessPrimitive, TessSink, Tessellator, Vec3, Vertex,
};

fn polygon(points: &[(f64, f64)]) -> Vec<Vertex> {
    points
        .iter()
        .map(|&(x, y)| Vertex::plain(Point3::new(x, y, 0.0), Vec3::Z))
        .collect()
}

fn normal_of(tri: &[Vertex; 3]) -> Vec3 {
    (tri[1].position - tri[0].position).cross(tri[2].position - tri[0].position)
}

fn area(triangles: &[[Vertex; 3]]) -> f64 {
    triangles.iter().map(|t| 0.5 * normal_of(t).length()).sum()
}

#[test]
fn triangle_is_returned_unchanged() {
    let mut tess = Tessellator::new();
    let input = polygon(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
    let triangles = tess.tessellate(&input).unwrap();
    assert_eq!(triangles.len(), 1);
    for v in &input {
        assert!(triangles[0].contains(v));
    }
    assert_eq!(tess.combined_count(), 0);
}

#[test]
fn concave_l_shape_covers_its_area() {
    let mut tess = Tessellator::new();
    let input =
        polygon(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)]);
    let triangles = tess.tessellate(&input).unwrap();
    assert_eq!(triangles.len(), 4);
    assert!((area(&triangles) - 3.0).abs() < 1e-9);
    for tri in &triangles {
        assert!(normal_of(tri).z > 0.0, "triangle wound against the polygon");
    }
}

#[test]
fn clockwise_input_keeps_its_winding() {
    let mut tess = Tessellator::new();
    let input = polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);
    let triangles = tess.tessellate(&input).unwrap();
    assert_eq!(triangles.len(), 2);
    for tri in &triangles {
        assert!(normal_of(tri).z < 0.0);
    }
}

#[test]
fn closing_duplicate_is_ignored() {
    let mut tess = Tessellator::new();
    let input = polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
    assert_eq!(tess.tessellate(&input).unwrap().len(), 2);
}

#[test]
fn self_intersection_synthesises_a_vertex() {
    let mut tess = Tessellator::new();
    let input = polygon(&[(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 1.0)]);
    let triangles = tess.tessellate(&input).unwrap();
    assert_eq!(tess.combined_count(), 1);
    assert_eq!(triangles.len(), 2);

    let crossing = Point3::new(2.0 / 3.0, 2.0 / 3.0, 0.0);
    let uses_crossing = |tri: &[Vertex; 3]| {
        tri.iter().any(|v| v.position.distance_to(crossing) < 1e-9)
    };
    assert!(triangles.iter().all(uses_crossing));
    assert!((area(&triangles) - 5.0 / 3.0).abs() < 1e-9);
}

#[test]
fn dense_star_exhausts_combine_capacity() {
    let (points, step) = (151_usize, 75_usize);
    let star: Vec<(f64, f64)> = (0..points)
        .map(|k| {
            let angle = std::f64::consts::TAU * ((k * step) % points) as f64 / points as f64;
            (angle.cos(), angle.sin())
        })
        .collect();
    let mut tess = Tessellator::new();
    let err = tess.tessellate(&polygon(&star)).unwrap_err();
    assert!(matches!(err, TessError::CombineCapacity));
    assert_eq!(tess.combined_count(), MAX_COMBINED_VERTICES);
}

#[test]
fn degenerate_inputs_are_rejected() {
    let mut tess = Tessellator::new();
    let err = tess.tessellate(&polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.0)])).unwrap_err();
    assert!(matches!(err, TessError::TooFewVertices(2)));
    let err = tess.tessellate(&polygon(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])).unwrap_err();
    assert!(matches!(err, TessError::Degenerate));
}

#[derive(Default)]
struct Recorder {
    begins: usize,
    vertices: usize,
    ends: usize,
}

impl TessSink for Recorder {
    fn begin(&mut self, primitive: TessPrimitive) {
        assert_eq!(primitive, TessPrimitive::Triangles);
        self.begins += 1;
    }

    fn vertex(&mut self, _vertex: &Vertex) {
        self.vertices += 1;
    }

    fn end(&mut self) {
        self.ends += 1;
    }
}

#[test]
fn sink_receives_one_triangle_batch() {
    let mut tess = Tessellator::new();
    let mut sink = Recorder::default();
    let input = polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    tess.tessellate_with(&input, &mut sink).unwrap();
    assert_eq!((sink.begins, sink.vertices, sink.ends), (1, 6, 1));
}
