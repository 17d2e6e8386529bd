//! Triangle meshes from the Wavefront OBJ subset: `v`, `vt`, `vn` and `f`.
//!
//! Polygonal faces are fanned. When every face corner carries a texture or
//! normal index the attribute is kept; corners with diverging attribute
//! indices for one position split that position.

use std::collections::HashMap;

use super::{content_lines, floats, token};
use crate::geom::{MeshError, TriMesh};

fn parse_error(line: usize, message: impl Into<String>) -> MeshError {
    MeshError::Parse { line, message: message.into() }
}

/// Resolves a 1-based or negative (relative) OBJ index against `len` entries.
fn resolve(index: &str, len: usize, what: &str) -> Result<usize, String> {
    let raw: i64 = token(index, what)?;
    let resolved = match raw {
        0 => None,
        i if i > 0 => usize::try_from(i - 1).ok(),
        i => usize::try_from(i.unsigned_abs()).ok().and_then(|back| len.checked_sub(back)),
    };
    resolved
        .filter(|&i| i < len)
        .ok_or_else(|| format!("{what} {raw} out of range (have {len})"))
}

type Corner = (usize, Option<usize>, Option<usize>);

/// Parses `text` into a mesh named `name`.
pub fn parse_obj_mesh(name: &str, text: &str) -> Result<TriMesh, MeshError> {
    let mut positions: Vec<[f64; 3]> = Vec::new();
    let mut texcoords: Vec<[f64; 2]> = Vec::new();
    let mut normals: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<[Corner; 3]> = Vec::new();

    for (line_no, line) in content_lines(text) {
        let err = |m: String| parse_error(line_no, m);
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            "v" => {
                // Optional vertex colours after xyz are ignored.
                let xyz = tokens.get(1..4).ok_or_else(|| err("`v` needs 3 coordinates".to_owned()))?;
                positions.push(floats::<3>(xyz, "vertex").map_err(err)?);
            }
            "vt" => {
                let uv = tokens.get(1..3).ok_or_else(|| err("`vt` needs 2 coordinates".to_owned()))?;
                texcoords.push(floats::<2>(uv, "texture coordinate").map_err(err)?);
            }
            "vn" => normals.push(floats::<3>(&tokens[1..], "normal").map_err(err)?),
            "f" => {
                let corners = tokens[1..]
                    .iter()
                    .map(|corner| {
                        let mut parts = corner.split('/');
                        let v = resolve(parts.next().unwrap_or_default(), positions.len(), "vertex index")?;
                        let vt = match parts.next() {
                            Some(s) if !s.is_empty() => Some(resolve(s, texcoords.len(), "texture index")?),
                            _ => None,
                        };
                        let vn = match parts.next() {
                            Some(s) if !s.is_empty() => Some(resolve(s, normals.len(), "normal index")?),
                            _ => None,
                        };
                        Ok((v, vt, vn))
                    })
                    .collect::<Result<Vec<Corner>, String>>()
                    .map_err(err)?;
                if corners.len() < 3 {
                    return Err(err(format!("face needs 3 corners, got {}", corners.len())));
                }
                for k in 1..corners.len() - 1 {
                    faces.push([corners[0], corners[k], corners[k + 1]]);
                }
            }
            // Grouping, smoothing and material statements carry nothing we draw.
            "o" | "g" | "s" | "usemtl" | "mtllib" | "l" | "p" => {}
            other => log::debug!("mesh `{name}` line {line_no}: skipping `{other}`"),
        }
    }

    if faces.is_empty() {
        return Err(MeshError::Invalid { name: name.to_owned(), reason: "no faces".to_owned() });
    }

    let with_uv = faces.iter().flatten().all(|c| c.1.is_some());
    let with_normals = faces.iter().flatten().all(|c| c.2.is_some());

    // One output vertex per distinct corner triple.
    let mut remap: HashMap<Corner, u32> = HashMap::new();
    let mut mesh = TriMesh::new(name, Vec::new(), Vec::new());
    let mut uvs = Vec::new();
    let mut mesh_normals = Vec::new();
    for corner in faces.iter().flatten() {
        let key = (corner.0, corner.1.filter(|_| with_uv), corner.2.filter(|_| with_normals));
        let next = u32::try_from(mesh.positions.len()).map_err(|_| MeshError::Invalid {
            name: name.to_owned(),
            reason: "too many vertices".to_owned(),
        })?;
        let index = *remap.entry(key).or_insert_with(|| {
            mesh.positions.push(positions[key.0]);
            if let Some(t) = key.1 {
                uvs.push(texcoords[t]);
            }
            if let Some(n) = key.2 {
                mesh_normals.push(normals[n]);
            }
            next
        });
        mesh.indices.push(index);
    }
    mesh.uvs = with_uv.then_some(uvs);
    mesh.normals = with_normals.then_some(mesh_normals);
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn quads_are_fanned_and_keep_texture_coordinates() {
        let mesh = parse_obj_mesh("quad", QUAD).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.uvs.as_ref().map(Vec::len), Some(4));
        assert!(mesh.normals.is_none());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn negative_indices_are_relative() {
        let mesh = parse_obj_mesh("tri", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_index_reports_the_line() {
        let err = parse_obj_mesh("bad", "v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, MeshError::Parse { line: 3, .. }));
    }

    #[test]
    fn gallery_generates_missing_normals() {
        let mut gallery = crate::geom::MeshGallery::new();
        let id = gallery.load("quad", QUAD).unwrap();
        let mesh = gallery.get(id).unwrap();
        assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(4));
    }
}
