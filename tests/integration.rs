use lsys_render::Engine;
use lsys_render::geom::{BBox, Point3};
use lsys_render::render::immediate::Primitive;
use lsys_render::render::{OutputFormat, TurtleCommand};
use lsys_render::session::{Session, SessionError};

const PLANT: &str = "\
# trunk
! 0.4
@Gs
F 2
@Gc
+ 30
F 1
@Ge
[
& 45
{
.
F 1
+ 120
F 1
+ 120
F 1
}
]
f 1
@O 0.6
[
- 60
F 1.5
]
";

const CONTOURS: &str = "\
contour hexagon
type closed
divisions 6
points 6
1 0
0.5 0.87
-0.5 0.87
-1 0
-0.5 -0.87
0.5 -0.87
end
";

const TETRAHEDRON: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
f 1 3 2
f 1 2 4
f 2 3 4
f 3 1 4
";

fn patch_surface() -> String {
    let mut text = String::from("surface leaf\nsize 1\nprecision S: 3 T: 3\npatch blade\n");
    for r in 0..4 {
        let row: Vec<String> = (0..4).map(|c| format!("{c} {r} {}", (c * r) as f64 * 0.1)).collect();
        text.push_str(&row.join(" "));
        text.push('\n');
    }
    text
}

fn inside(bounds: &BBox, p: Point3) -> bool {
    let eps = 1e-9 * (1.0 + bounds.max.distance_to(bounds.min));
    (bounds.min.x - eps..=bounds.max.x + eps).contains(&p.x)
        && (bounds.min.y - eps..=bounds.max.y + eps).contains(&p.y)
        && (bounds.min.z - eps..=bounds.max.z + eps).contains(&p.z)
}

fn parse_point(tokens: &[&str]) -> Point3 {
    let coord = |i: usize| tokens[i].parse::<f64>().unwrap();
    Point3::new(coord(0), coord(1), coord(2))
}

fn loaded_session() -> Session {
    let mut session = Session::new();
    session.load_contours(CONTOURS).unwrap();
    assert_eq!(session.load_surface(&patch_surface()).unwrap(), 0);
    assert_eq!(session.load_mesh("tetra", TETRAHEDRON).unwrap(), 0);
    let script = format!("{PLANT}f 2\n~ 0 0.5\nf 2\nmesh 0 2\n");
    session.load_script(&script).unwrap();
    session
}

#[test]
fn obj_vertices_lie_inside_the_bounding_box() {
    let session = loaded_session();
    let bounds = session.bounding_box().unwrap().expect("scene has geometry");
    let obj = session.render_text(OutputFormat::Obj).unwrap().main;

    let mut vertices = 0;
    for line in obj.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() == Some(&"v") {
            let p = parse_point(&tokens[1..]);
            assert!(inside(&bounds, p), "{p:?} outside {bounds:?}");
            vertices += 1;
        }
    }
    assert!(vertices > 0);
}

#[test]
fn rayshade_triangles_lie_inside_the_bounding_box() {
    let session = loaded_session();
    let bounds = session.bounding_box().unwrap().expect("scene has geometry");
    let ray = session.render_text(OutputFormat::Rayshade).unwrap().main;

    let mut triangles = 0;
    for line in ray.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() != Some(&"triangle") {
            continue;
        }
        // name, then three (position, normal) pairs
        for corner in 0..3 {
            let at = 2 + corner * 6;
            let p = parse_point(&tokens[at..at + 3]);
            assert!(inside(&bounds, p), "{p:?} outside {bounds:?}");
        }
        triangles += 1;
    }
    assert!(triangles > 0);
}

#[test]
fn loaded_contour_shapes_the_cylinder() {
    let mut session = Session::new();
    session.load_contours(CONTOURS).unwrap();
    session.load_script("set_contour 1\n@Gs\nF 1\n@Ge\n").unwrap();

    let list = session.display_list().unwrap();
    assert_eq!(list.count(Primitive::QuadStrip), 1);
    assert_eq!(list.vertex_count(), 2 * 6);
}

#[test]
fn unloaded_ids_are_skipped() {
    let mut session = Session::new();
    session.set_commands(vec![
        TurtleCommand::Surface { id: 3, scale: 1.0 },
        TurtleCommand::Mesh { id: 0, scale: 1.0 },
    ]);
    assert_eq!(session.bounding_box().unwrap(), None);
    assert_eq!(session.display_list().unwrap().vertex_count(), 0);
}

#[test]
fn parse_errors_surface_through_the_session() {
    let mut session = Session::new();
    assert!(matches!(session.load_script("F\nwobble\n"), Err(SessionError::Script(_))));
    assert!(matches!(session.load_contours("contour\n"), Err(SessionError::Contour(_))));
    assert!(matches!(session.load_surface("surface s\n"), Err(SessionError::Surface(_))));
    assert!(matches!(session.load_mesh("m", "f 1 2 3\n"), Err(SessionError::Mesh(_))));
    assert!(matches!(session.load_config("<render>"), Err(SessionError::Config(_))));
}

#[test]
fn polygon_is_filled_in_postscript() {
    let mut session = Session::new();
    session.load_script("{\n.\nF 1\n+ 90\nF 1\n+ 90\nF 1\n}\n").unwrap();
    let ps = session.render_text(OutputFormat::PostScript).unwrap().main;
    assert!(ps.starts_with("%!PS-Adobe"));
    assert!(ps.contains(" fill"));
}

#[test]
fn render_to_path_writes_obj_and_mtl() {
    let dir = std::env::temp_dir().join(format!("lsys-render-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("plant.obj");

    let mut session = Session::new();
    session.load_script(PLANT).unwrap();
    session.render_to_path(OutputFormat::Obj, &path).unwrap();

    let obj = std::fs::read_to_string(&path).unwrap();
    let mtl = std::fs::read_to_string(dir.join("plant.mtl")).unwrap();
    assert!(obj.contains("mtllib plant.mtl"));
    assert!(mtl.contains("newmtl"));

    let err = session.render_to_path(OutputFormat::Display, &path).unwrap_err();
    assert!(matches!(err, SessionError::NoFileOutput(OutputFormat::Display)));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn engine_rejects_bad_input_natively() {
    let mut engine = Engine::new();
    assert!(engine.is_initialized());
    assert!(engine.load_script(PLANT).is_ok());
    assert!(engine.load_mesh("broken", "v 0 0\n").is_err());
    assert!(engine.render("gif").is_err());
}
