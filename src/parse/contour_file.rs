//! Contour gallery files.
//!
//! ```text
//! contour leaf
//! type closed
//! divisions 12          # optional
//! points 4
//! 0 0
//! 1 0 2                 # optional multiplicity
//! 1 1
//! 0 1
//! end
//! ```

use super::{content_lines, floats, token};
use crate::geom::{Contour, ContourError, ContourKind, MAX_DIVISIONS, MIN_DIVISIONS, Point3};

fn parse_error(line: usize, message: impl Into<String>) -> ContourError {
    ContourError::Parse { line, message: message.into() }
}

#[derive(Default)]
struct Header {
    name: String,
    kind: Option<ContourKind>,
    divisions: Option<usize>,
    expected: usize,
    points: Vec<Point3>,
    start_line: usize,
}

impl Header {
    fn finish(self, line: usize) -> Result<Contour, ContourError> {
        let kind = self
            .kind
            .ok_or_else(|| parse_error(line, format!("contour `{}` has no type", self.name)))?;
        Contour::from_control_points(self.name, kind, self.points, self.divisions)
    }
}

enum State {
    Outside,
    Header(Header),
    Points(Header),
}

/// Parses every contour in `text`; any malformed block fails the whole file.
pub fn parse_contours(text: &str) -> Result<Vec<Contour>, ContourError> {
    let mut contours = Vec::new();
    let mut state = State::Outside;

    for (line_no, line) in content_lines(text) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let keyword = tokens[0].to_ascii_lowercase();
        state = match state {
            State::Outside => {
                if keyword != "contour" {
                    return Err(parse_error(line_no, format!("expected `contour`, got `{line}`")));
                }
                let name = tokens[1..].join(" ");
                let name = if name.is_empty() { format!("contour{}", contours.len() + 1) } else { name };
                State::Header(Header { name, start_line: line_no, ..Header::default() })
            }
            State::Header(mut header) => {
                let value = tokens.get(1).copied().unwrap_or_default();
                match keyword.as_str() {
                    "type" => {
                        header.kind = Some(match value.to_ascii_lowercase().as_str() {
                            "closed" => ContourKind::Closed,
                            "open" => ContourKind::Open,
                            other => {
                                return Err(parse_error(line_no, format!("unknown contour type `{other}`")));
                            }
                        });
                        State::Header(header)
                    }
                    "divisions" => {
                        let divisions: usize =
                            token(value, "division count").map_err(|m| parse_error(line_no, m))?;
                        if !(MIN_DIVISIONS..=MAX_DIVISIONS).contains(&divisions) {
                            return Err(parse_error(
                                line_no,
                                format!(
                                    "divisions must be between {} and {}, got {divisions}",
                                    MIN_DIVISIONS, MAX_DIVISIONS
                                ),
                            ));
                        }
                        header.divisions = Some(divisions);
                        State::Header(header)
                    }
                    "points" => {
                        header.expected =
                            token(value, "point count").map_err(|m| parse_error(line_no, m))?;
                        State::Points(header)
                    }
                    _ => return Err(parse_error(line_no, format!("unexpected `{line}` in contour header"))),
                }
            }
            State::Points(mut header) => {
                if keyword == "end" {
                    if header.points.len() != header.expected {
                        return Err(parse_error(
                            line_no,
                            format!(
                                "contour `{}` declares {} points but lists {}",
                                header.name,
                                header.expected,
                                header.points.len()
                            ),
                        ));
                    }
                    contours.push(header.finish(line_no)?);
                    State::Outside
                } else {
                    let (xy, multiplicity) = match tokens.len() {
                        2 => (&tokens[..], 1),
                        3 => {
                            let m: usize = token(tokens[2], "multiplicity")
                                .map_err(|m| parse_error(line_no, m))?;
                            (&tokens[..2], m.max(1))
                        }
                        _ => return Err(parse_error(line_no, format!("expected `x y [multiplicity]`, got `{line}`"))),
                    };
                    let [x, y] = floats::<2>(xy, "control point").map_err(|m| parse_error(line_no, m))?;
                    // Multiplicity counts as that many entries of the declared total.
                    header.points.extend(std::iter::repeat_n(Point3::new(x, y, 0.0), multiplicity));
                    State::Points(header)
                }
            }
        };
    }

    match state {
        State::Outside => Ok(contours),
        State::Header(header) | State::Points(header) => Err(parse_error(
            header.start_line,
            format!("contour `{}` is missing `end`", header.name),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "\
# two contours
contour square
type closed
divisions 9
points 4
-1 -1
 1 -1
 1  1
-1  1
end

contour arc
type open
points 3
0 0
1 1 2
end
";

    #[test]
    fn parses_closed_and_open_contours() {
        let contours = parse_contours(SQUARE).unwrap();
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].name(), "square");
        assert!(contours[0].is_closed());
        assert!(contours[0].is_specified());
        assert_eq!(contours[0].divisions(), 9);
        assert!(!contours[1].is_closed());
        assert!(!contours[1].is_specified());
    }

    #[test]
    fn missing_end_fails() {
        let err = parse_contours("contour a\ntype closed\npoints 3\n0 0\n1 0\n0 1\n").unwrap_err();
        assert!(err.to_string().contains("missing `end`"));
    }

    #[test]
    fn point_count_mismatch_reports_the_line() {
        let err = parse_contours("contour a\ntype open\npoints 3\n0 0\n1 0\nend\n").unwrap_err();
        assert!(matches!(err, ContourError::Parse { line: 6, .. }));
    }

    #[test]
    fn divisions_out_of_range_fail() {
        let text = "contour a\ntype open\ndivisions 1\npoints 2\n0 0\n1 0\nend\n";
        assert!(parse_contours(text).is_err());
    }

    #[test]
    fn gallery_keeps_previous_contours_on_error() {
        let mut gallery = crate::geom::ContourGallery::new();
        assert_eq!(gallery.load(SQUARE).unwrap(), 2);
        assert!(gallery.load("contour broken\ntype spiral\n").is_err());
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.get(1).name(), "square");
    }
}
