//! Wrapped (B-spline net) surface files.
//!
//! ```text
//! wrapped trunk
//! size 4 6            # rows cols
//! closed yes
//! resolution 12 8     # optional, u v
//! points
//! <rows * cols lines of x y z, row by row>
//! end
//! ```

use super::{content_lines, floats, token};
use crate::geom::{Point3, WrappedSurface, WrappedSurfaceError};

fn parse_error(line: usize, message: impl Into<String>) -> WrappedSurfaceError {
    WrappedSurfaceError::Parse { line, message: message.into() }
}

fn flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "closed" => Ok(true),
        "no" | "false" | "0" | "open" => Ok(false),
        _ => Err(format!("invalid flag `{value}`")),
    }
}

/// Parses one wrapped-surface file.
pub fn parse_wrapped_surface(text: &str) -> Result<WrappedSurface, WrappedSurfaceError> {
    let mut name = String::from("wrapped");
    let mut size: Option<(usize, usize)> = None;
    let mut closed = false;
    let mut resolution = None;
    let mut points: Option<Vec<Point3>> = None;
    let mut finished = false;
    let mut last_line = 0;

    for (line_no, line) in content_lines(text) {
        last_line = line_no;
        let err = |m: String| parse_error(line_no, m);
        if finished {
            return Err(err(format!("unexpected `{line}` after `end`")));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let keyword = tokens[0].to_ascii_lowercase();

        if let Some(list) = points.as_mut() {
            if keyword == "end" {
                finished = true;
            } else {
                list.push(Point3::from_array(floats::<3>(&tokens, "control point").map_err(err)?));
            }
            continue;
        }

        match keyword.as_str() {
            "wrapped" => name = tokens[1..].join(" "),
            "size" => {
                let [rows, cols] = match tokens[1..] {
                    [r, c] => [token(r, "row count").map_err(err)?, token(c, "column count").map_err(err)?],
                    _ => return Err(err("`size` needs a row and a column count".to_owned())),
                };
                size = Some((rows, cols));
            }
            "closed" => closed = flag(tokens.get(1).copied().unwrap_or("yes")).map_err(err)?,
            "resolution" => {
                let [u, v] = match tokens[1..] {
                    [u, v] => [token(u, "u resolution").map_err(err)?, token(v, "v resolution").map_err(err)?],
                    _ => return Err(err("`resolution` needs two counts".to_owned())),
                };
                resolution = Some((u, v));
            }
            "points" => {
                if size.is_none() {
                    return Err(err("`points` before `size`".to_owned()));
                }
                points = Some(Vec::new());
            }
            _ => return Err(err(format!("unexpected `{line}`"))),
        }
    }

    let (Some((rows, cols)), Some(control)) = (size, points) else {
        return Err(parse_error(last_line, "missing `size` or `points`"));
    };
    if !finished {
        return Err(parse_error(last_line, "missing `end`"));
    }
    let mut surface = WrappedSurface::new(name, rows, cols, control, closed)?;
    if let Some((u, v)) = resolution {
        surface.resolution = (usize::max(u, 1), usize::max(v, 1));
    }
    Ok(surface)
}
