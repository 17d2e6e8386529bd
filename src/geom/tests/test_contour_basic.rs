use std::borrow::Cow;

use crate::geom::{ContourError, ContourGallery, DEFAULT_DIVISIONS};

const TWO_CONTOURS: &str = "\
contour square
type closed
divisions 6
points 4
-1 -1
1 -1
1 1
-1 1
end

contour arc
type open
points 3
-1 0
0 1
1 0
end
";

#[test]
fn gallery_starts_with_the_circle() {
    let gallery = ContourGallery::new();
    assert_eq!(gallery.len(), 1);
    assert_eq!(gallery.get(0).name(), "circle");
    assert_eq!(gallery.get(0).divisions(), DEFAULT_DIVISIONS);
    assert!(!gallery.get(0).is_specified());
    assert!(gallery.try_get(1).is_none());
}

#[test]
fn load_appends_after_the_circle() {
    let mut gallery = ContourGallery::new();
    assert_eq!(gallery.load(TWO_CONTOURS).unwrap(), 2);
    assert_eq!(gallery.len(), 3);

    let square = gallery.get(1);
    assert_eq!(square.name(), "square");
    assert!(square.is_specified());
    assert_eq!(square.divisions(), 6);
    assert!(square.is_closed());

    let arc = gallery.get(2);
    assert!(!arc.is_closed());
    assert_eq!(arc.divisions(), DEFAULT_DIVISIONS);

    // A second load replaces the first one.
    let triangle = "contour tri\ntype closed\npoints 3\n0 0\n1 0\n0 1\nend\n";
    assert_eq!(gallery.load(triangle).unwrap(), 1);
    assert_eq!(gallery.len(), 2);
    assert_eq!(gallery.get(1).name(), "tri");
}

#[test]
fn empty_file_is_an_error() {
    let mut gallery = ContourGallery::new();
    assert!(matches!(gallery.load("# nothing here\n"), Err(ContourError::Empty)));
    assert_eq!(gallery.len(), 1);
}

#[test]
fn blend_endpoints_borrow_the_inputs() {
    let mut gallery = ContourGallery::new();
    gallery.load(TWO_CONTOURS).unwrap();
    gallery.set_divisions(1, DEFAULT_DIVISIONS);

    let start = gallery.get_blended(0, 1, 0.0).unwrap();
    assert!(matches!(start, Cow::Borrowed(c) if c.name() == "circle"));
    let finish = gallery.get_blended(0, 1, 1.0).unwrap();
    assert!(matches!(finish, Cow::Borrowed(c) if c.name() == "square"));

    let halfway = gallery.get_blended(0, 1, 0.5).unwrap();
    assert!(matches!(halfway, Cow::Owned(_)));
    let (circle, square) = (gallery.get(0), gallery.get(1));
    for i in 0..halfway.divisions() {
        let expected = circle.vertex(i).lerp(square.vertex(i), 0.5);
        assert!(halfway.vertex(i).distance_to(expected) < 1e-9);
    }
}

#[test]
fn blend_of_unsynchronised_contours_fails() {
    let mut gallery = ContourGallery::new();
    gallery.load(TWO_CONTOURS).unwrap();
    let err = gallery.get_blended(0, 1, 0.5).unwrap_err();
    assert!(matches!(err, ContourError::DivisionMismatch { first: 8, second: 6 }));

    let section = gallery.cross_section(0, 1, 0.5, 10);
    assert_eq!(section.divisions(), 10);
}
