//! Bezier patch surface files.
//!
//! ```text
//! surface leaf
//! bounds -1 1 0 2 -0.1 0.1     # optional: xmin xmax ymin ymax zmin zmax
//! size 2
//! contact X: 0 Y: 0 Z: 0
//! end X: 0 Y: 2 Z: 0
//! heading X: 0 Y: 1 Z: 0
//! up X: 0 Y: 0 Z: 1
//! precision S: 8 T: 8          # optional
//! texture 1                    # optional
//! patch blade
//! <4 lines of 12 numbers: 4 control points per row>
//! ```
//!
//! `end` is checked but the surface is placed by its contact point only.

use std::sync::LazyLock;

use regex::Regex;

use super::{content_lines, floats, token};
use crate::geom::{MAX_PATCH_DIVISIONS, Patch, Point3, Surface, SurfaceError, Vec3};

static VECTOR_LINE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\w+)\s+X:\s*(\S+)\s+Y:\s*(\S+)\s+Z:\s*(\S+)$")
});

static PRECISION_LINE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)^precision\s+S:\s*(\S+)\s+T:\s*(\S+)$"));

fn parse_error(line: usize, message: impl Into<String>) -> SurfaceError {
    SurfaceError::Parse { line, message: message.into() }
}

fn regex(cell: &'static LazyLock<Result<Regex, regex::Error>>) -> Result<&'static Regex, SurfaceError> {
    cell.as_ref().map_err(|err| parse_error(0, err.to_string()))
}

#[derive(Default)]
struct Placement {
    size: Option<f64>,
    contact: Option<Point3>,
    end: Option<Point3>,
    heading: Option<Vec3>,
    up: Option<Vec3>,
    precision: Option<(usize, usize)>,
    texture: Option<usize>,
}

struct PendingPatch {
    name: String,
    rows: Vec<[Point3; 4]>,
}

/// Parses one surface file.
pub fn parse_surface(text: &str) -> Result<Surface, SurfaceError> {
    let vector_line = regex(&VECTOR_LINE)?;
    let precision_line = regex(&PRECISION_LINE)?;

    let mut name = None;
    let mut placement = Placement::default();
    let mut patches = Vec::new();
    let mut pending: Option<PendingPatch> = None;

    for (line_no, line) in content_lines(text) {
        let err = |m: String| parse_error(line_no, m);

        if let Some(patch) = pending.as_mut() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let values = floats::<12>(&tokens, "patch row").map_err(err)?;
            let row = [0, 1, 2, 3].map(|k| Point3::new(values[3 * k], values[3 * k + 1], values[3 * k + 2]));
            patch.rows.push(row);
            if patch.rows.len() == 4 {
                if let Some(done) = pending.take() {
                    let control = [done.rows[0], done.rows[1], done.rows[2], done.rows[3]];
                    patches.push(Patch::new(done.name, control));
                }
            }
            continue;
        }

        if let Some(caps) = precision_line.captures(line) {
            let s: usize = token(&caps[1], "s precision").map_err(err)?;
            let t: usize = token(&caps[2], "t precision").map_err(err)?;
            placement.precision = Some((s.clamp(1, MAX_PATCH_DIVISIONS), t.clamp(1, MAX_PATCH_DIVISIONS)));
            continue;
        }

        if let Some(caps) = vector_line.captures(line) {
            let xyz = floats::<3>(&[&caps[2], &caps[3], &caps[4]], &caps[1]).map_err(err)?;
            match caps[1].to_ascii_lowercase().as_str() {
                "contact" => placement.contact = Some(Point3::from_array(xyz)),
                "end" => placement.end = Some(Point3::from_array(xyz)),
                "heading" => placement.heading = Some(Vec3::from_array(xyz)),
                "up" => placement.up = Some(Vec3::from_array(xyz)),
                other => return Err(err(format!("unknown vector `{other}`"))),
            }
            continue;
        }

        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match keyword.to_ascii_lowercase().as_str() {
            "surface" => name = Some(rest.to_owned()),
            "bounds" => {
                let tokens: Vec<&str> = rest.split_whitespace().collect();
                let b = floats::<6>(&tokens, "bounds").map_err(err)?;
                if b[0] > b[1] || b[2] > b[3] || b[4] > b[5] {
                    return Err(err(format!("bounds are inverted: {b:?}")));
                }
            }
            "size" => placement.size = Some(token(rest, "size").map_err(err)?),
            "texture" => placement.texture = Some(token(rest, "texture id").map_err(err)?),
            "patch" => {
                let name = if rest.is_empty() { format!("patch{}", patches.len() + 1) } else { rest.to_owned() };
                pending = Some(PendingPatch { name, rows: Vec::with_capacity(4) });
            }
            _ => return Err(err(format!("unexpected `{line}`"))),
        }
    }

    if let Some(patch) = pending {
        return Err(parse_error(0, format!("patch `{}` has {} of 4 rows", patch.name, patch.rows.len())));
    }

    let mut surface = Surface::new(name.unwrap_or_else(|| "surface".to_owned()), patches)?;
    if let Some(size) = placement.size {
        surface.size = size;
    }
    if let Some(contact) = placement.contact {
        surface.contact = contact;
    }
    if let Some(heading) = placement.heading {
        surface.heading = heading.normalized_or(Vec3::Y);
    }
    if let Some(up) = placement.up {
        surface.up = up.normalized_or(Vec3::Z);
    }
    if let (Some(end), Some(bounds)) = (placement.end, surface.bounds()) {
        if !bounds.contains_point(end, surface.size.abs() * 1e-3) {
            log::warn!("surface `{}`: end point lies outside its control points", surface.name);
        }
    }
    if let Some((s, t)) = placement.precision {
        surface.s_divisions = s;
        surface.t_divisions = t;
    }
    surface.texture = placement.texture;
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_patch() -> String {
        let mut rows = String::new();
        for r in 0..4 {
            let row: Vec<String> = (0..4).map(|c| format!("{c} {r} 0")).collect();
            rows.push_str(&row.join(" "));
            rows.push('\n');
        }
        rows
    }

    #[test]
    fn parses_placement_and_patches() {
        let text = format!(
            "surface leaf\nsize 3\ncontact X: 1.5 Y: 0 Z: 0\nend X: 1.5 Y: 3 Z: 0\n\
             heading X: 0 Y: 2 Z: 0\nup X: 0 Y: 0 Z: 1\nprecision S: 4 T: 6\n\
             patch a\n{}patch b\n{}",
            flat_patch(),
            flat_patch()
        );
        let surface = parse_surface(&text).unwrap();
        assert_eq!(surface.name, "leaf");
        assert_eq!(surface.patches.len(), 2);
        assert_eq!(surface.size, 3.0);
        assert_eq!(surface.contact, Point3::new(1.5, 0.0, 0.0));
        assert_eq!(surface.heading, Vec3::Y);
        assert_eq!((surface.s_divisions, surface.t_divisions), (4, 6));
        assert_eq!(surface.patches[1].control[3][2], Point3::new(2.0, 3.0, 0.0));
    }

    #[test]
    fn truncated_patch_fails() {
        let text = "surface s\npatch a\n0 0 0 1 0 0 2 0 0 3 0 0\n";
        assert!(parse_surface(text).unwrap_err().to_string().contains("1 of 4 rows"));
    }

    #[test]
    fn surface_without_patches_fails() {
        assert!(matches!(parse_surface("surface empty\nsize 1\n"), Err(SurfaceError::NoPatches { .. })));
    }

    #[test]
    fn failed_load_leaves_the_id_unloaded() {
        let mut gallery = crate::geom::SurfaceGallery::new();
        assert!(gallery.load("surface s\nsize x\n").is_err());
        assert!(gallery.get(0).is_none());
        assert_eq!(gallery.len(), 1);
    }
}
