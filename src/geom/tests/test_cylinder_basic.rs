use crate::geom::{
    ContourGallery, CylinderEngine, DEFAULT_DIVISIONS, GcError, GcPiece, GcSection, GcSettings,
    OrientationFrame, Quat, Tessellator, Vec3, Vertex, WidthScale,
};

fn section_at(distance: f64) -> GcSection {
    let mut frame = OrientationFrame::default();
    frame.move_forward(distance);
    GcSection::new(frame, 0)
}

#[test]
fn start_point_end_builds_one_strip_per_segment() {
    let contours = ContourGallery::new();
    let settings = GcSettings::default();
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();

    assert!(gc.start(&contours, section_at(0.0), &settings, &mut tess).unwrap().is_empty());
    assert!(gc.is_active());
    let middle = gc.point(&contours, section_at(1.0), &settings).unwrap();
    let last = gc.end(&contours, section_at(2.0), &settings, &mut tess).unwrap();
    assert!(!gc.is_active());

    for pieces in [&middle, &last] {
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].quad_count(), DEFAULT_DIVISIONS - 1);
    }
    let GcPiece::Strip { begin, end } = &last[0] else {
        panic!("expected a strip");
    };
    assert_eq!(begin.len(), end.len());
    assert!(begin.iter().all(|v| (v.position.y - 1.0).abs() < 1e-12));
    assert!(end.iter().all(|v| (v.position.y - 2.0).abs() < 1e-12));
    assert!(end[0].uv[1] > begin[0].uv[1]);
}

#[test]
fn zero_length_segment_is_skipped() {
    let contours = ContourGallery::new();
    let settings = GcSettings::default();
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();

    gc.start(&contours, section_at(1.0), &settings, &mut tess).unwrap();
    assert!(gc.point(&contours, section_at(1.0), &settings).unwrap().is_empty());
    assert!(gc.is_active());
}

#[test]
fn nested_start_needs_a_branch() {
    let contours = ContourGallery::new();
    let settings = GcSettings::default();
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();

    gc.start(&contours, section_at(0.0), &settings, &mut tess).unwrap();
    let err = gc.start(&contours, section_at(1.0), &settings, &mut tess).unwrap_err();
    assert!(matches!(err, GcError::AlreadyActive));
    assert_eq!(gc.captured().map(|s| s.frame.position.y), Some(0.0));

    gc.start_branch();
    let pieces = gc.start(&contours, section_at(1.0), &settings, &mut tess).unwrap();
    assert_eq!(pieces.len(), 1);
    assert!(gc.is_active());
    assert!(!gc.is_branch_pending());
}

#[test]
fn point_and_end_need_an_active_cylinder() {
    let contours = ContourGallery::new();
    let settings = GcSettings::default();
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();

    let err = gc.point(&contours, section_at(1.0), &settings).unwrap_err();
    assert!(matches!(err, GcError::NotActive));
    let err = gc.end(&contours, section_at(1.0), &settings, &mut tess).unwrap_err();
    assert!(matches!(err, GcError::NotActive));
}

#[test]
fn unknown_contour_is_rejected() {
    let contours = ContourGallery::new();
    let mut gc = CylinderEngine::new();
    let section = GcSection { contour2: 5, blend: 0.5, ..section_at(0.0) };
    let err = gc
        .start(&contours, section, &GcSettings::default(), &mut Tessellator::new())
        .unwrap_err();
    assert!(matches!(err, GcError::InvalidContour(5)));
    assert!(!gc.is_active());
}

#[test]
fn capped_cylinder_closes_both_ends() {
    let contours = ContourGallery::new();
    let settings = GcSettings { capped: true, ..GcSettings::default() };
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();

    let first = gc.start(&contours, section_at(0.0), &settings, &mut tess).unwrap();
    let last = gc.end(&contours, section_at(1.0), &settings, &mut tess).unwrap();

    let GcPiece::Cap { triangles } = &first[0] else {
        panic!("expected a start cap");
    };
    assert_eq!(triangles.len(), DEFAULT_DIVISIONS - 1);
    assert!(triangles.iter().flatten().all(|v| v.normal == -Vec3::Y));

    assert_eq!(last.len(), 2);
    let GcPiece::Cap { triangles } = &last[1] else {
        panic!("expected an end cap");
    };
    assert!(triangles.iter().flatten().all(|v| v.normal == Vec3::Y));
}

#[test]
fn divisions_override_changes_the_ring() {
    let contours = ContourGallery::new();
    let settings = GcSettings::default();
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();

    let section = |distance| GcSection { divisions: Some(16), ..section_at(distance) };
    gc.start(&contours, section(0.0), &settings, &mut tess).unwrap();
    let pieces = gc.end(&contours, section(1.0), &settings, &mut tess).unwrap();
    assert_eq!(pieces[0].quad_count(), 15);
}

#[test]
fn closing_the_branch_restores_already_active() {
    let contours = ContourGallery::new();
    let settings = GcSettings::default();
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();

    gc.start(&contours, section_at(0.0), &settings, &mut tess).unwrap();
    gc.start_branch();
    gc.start_branch();
    gc.end_branch();
    assert!(gc.is_branch_pending());
    gc.end_branch();
    assert!(!gc.is_branch_pending());
    let err = gc.start(&contours, section_at(1.0), &settings, &mut tess).unwrap_err();
    assert!(matches!(err, GcError::AlreadyActive));
}

fn strip_between(
    begin: GcSection,
    end: GcSection,
    settings: &GcSettings,
) -> (Vec<Vertex>, Vec<Vertex>) {
    let contours = ContourGallery::new();
    let mut tess = Tessellator::new();
    let mut gc = CylinderEngine::new();
    gc.start(&contours, begin, settings, &mut tess).unwrap();
    let mut pieces = gc.end(&contours, end, settings, &mut tess).unwrap();
    match pieces.remove(0) {
        GcPiece::Strip { begin, end } => (begin, end),
        GcPiece::Cap { .. } => panic!("expected a strip"),
    }
}

#[test]
fn tapered_cone_normals_lean_towards_the_narrow_end() {
    let wide = GcSection {
        frame: OrientationFrame { scale: WidthScale::uniform(1.0), ..section_at(0.0).frame },
        ..section_at(0.0)
    };
    let narrow = GcSection {
        frame: OrientationFrame { scale: WidthScale::uniform(0.5), ..section_at(1.0).frame },
        ..section_at(1.0)
    };

    let tapered = GcSettings { tapered: true, ..GcSettings::default() };
    let (begin, end) = strip_between(wide, narrow, &tapered);
    for v in begin.iter().chain(&end) {
        assert!(v.normal.dot(Vec3::Y) > 0.1, "{:?}", v.normal);
        assert!((v.normal.length() - 1.0).abs() < 1e-9);
        let radial = Vec3::new(v.position.x, 0.0, v.position.z);
        assert!(v.normal.dot(radial) > 0.0);
    }

    // Without tapering the contour normals stay perpendicular to the axis.
    let (begin, _) = strip_between(wide, narrow, &GcSettings::default());
    assert!(begin.iter().all(|v| v.normal.dot(Vec3::Y).abs() < 1e-12));
}

#[test]
fn normal_override_rotates_the_ring_normals() {
    let settings = GcSettings::default();
    let (plain, _) = strip_between(section_at(0.0), section_at(1.0), &settings);

    let tilted = |distance| GcSection { normal: Some(Vec3::X), ..section_at(distance) };
    let (begin, end) = strip_between(tilted(0.0), tilted(1.0), &settings);

    let q = Quat::from_rotation_arc(OrientationFrame::default().up, Vec3::X).unwrap();
    for (v, p) in begin.iter().zip(&plain) {
        assert!((v.normal - q.rotate(p.normal)).length() < 1e-9);
        assert!((v.position - p.position).length() < 1e-12);
    }
    assert!(end.iter().zip(&begin).all(|(e, b)| (e.normal - b.normal).length() < 1e-9));
}
