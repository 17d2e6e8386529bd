use super::core::{BBox, Point3, Vec3};

/// A renderable vertex: position, unit normal and texture coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3,
    pub normal: Vec3,
    pub uv: [f64; 2],
}

impl Vertex {
    #[must_use]
    pub const fn new(position: Point3, normal: Vec3, uv: [f64; 2]) -> Self {
        Self { position, normal, uv }
    }

    /// Vertex with a zero texture coordinate.
    #[must_use]
    pub const fn plain(position: Point3, normal: Vec3) -> Self {
        Self { position, normal, uv: [0.0, 0.0] }
    }

    /// Attribute-wise interpolation; the normal is re-normalised.
    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self {
            position: self.position.lerp(rhs.position, t),
            normal: self.normal.lerp(rhs.normal, t).normalized_or(self.normal),
            uv: [
                self.uv[0] + (rhs.uv[0] - self.uv[0]) * t,
                self.uv[1] + (rhs.uv[1] - self.uv[1]) * t,
            ],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("mesh file line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("mesh `{name}` is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

/// Indexed triangle mesh as loaded from a mesh file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriMesh {
    pub name: String,
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub uvs: Option<Vec<[f64; 2]>>,
    pub normals: Option<Vec<[f64; 3]>>,
}

impl TriMesh {
    #[must_use]
    pub fn new(name: impl Into<String>, positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self { name: name.into(), positions, indices, uvs: None, normals: None }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions.iter().any(|p| p.iter().any(|c| !c.is_finite()))
    }

    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len() as u32;
        self.indices.iter().all(|&i| i < n)
    }

    #[must_use]
    pub fn has_valid_attribute_lengths(&self) -> bool {
        let n = self.positions.len();
        self.uvs.as_ref().map_or(true, |uvs| uvs.len() == n)
            && self.normals.as_ref().map_or(true, |normals| normals.len() == n)
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        let invalid = |reason: &str| MeshError::Invalid {
            name: self.name.clone(),
            reason: reason.to_owned(),
        };
        if self.indices.len() % 3 != 0 {
            return Err(invalid("indices are not a triangle list"));
        }
        if self.has_invalid_vertices() {
            return Err(invalid("vertex coordinates contain NaN/Inf"));
        }
        if !self.has_valid_indices() {
            return Err(invalid("vertex indices out of bounds"));
        }
        if !self.has_valid_attribute_lengths() {
            return Err(invalid("attribute buffers do not match vertex count"));
        }
        Ok(())
    }

    /// Fills `normals` with area-weighted smooth vertex normals when absent.
    pub fn ensure_normals(&mut self) {
        if self.normals.is_none() {
            self.normals = Some(compute_smooth_normals(&self.positions, &self.indices));
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Option<BBox> {
        let points: Vec<Point3> = self.positions.iter().copied().map(Point3::from_array).collect();
        BBox::from_points(&points)
    }

    #[must_use]
    pub fn vertex(&self, index: usize) -> Vertex {
        let position = Point3::from_array(self.positions[index]);
        let normal = self
            .normals
            .as_ref()
            .map_or(Vec3::Z, |normals| Vec3::from_array(normals[index]));
        let uv = self.uvs.as_ref().map_or([0.0, 0.0], |uvs| uvs[index]);
        Vertex { position, normal, uv }
    }

    /// Triangles with attributes resolved, in index order.
    pub fn triangles(&self) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.vertex(tri[0] as usize),
                self.vertex(tri[1] as usize),
                self.vertex(tri[2] as usize),
            ]
        })
    }
}

fn compute_smooth_normals(positions: &[[f64; 3]], indices: &[u32]) -> Vec<[f64; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (Some(a), Some(b), Some(c)) = (positions.get(i0), positions.get(i1), positions.get(i2))
        else {
            continue;
        };
        let a = Point3::from_array(*a);
        let n = (Point3::from_array(*b) - a).cross(Point3::from_array(*c) - a);
        normals[i0] += n;
        normals[i1] += n;
        normals[i2] += n;
    }

    normals.into_iter().map(|n| n.normalized_or(Vec3::Z).to_array()).collect()
}

/// Mesh gallery; an entry that failed to load stays as `None` ("unloaded").
#[derive(Debug, Clone, Default)]
pub struct MeshGallery {
    meshes: Vec<Option<TriMesh>>,
}

impl MeshGallery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads one mesh file into the next id. A malformed file leaves the id unloaded.
    pub fn load(&mut self, name: &str, text: &str) -> Result<usize, MeshError> {
        let id = self.meshes.len();
        match crate::parse::obj_mesh::parse_obj_mesh(name, text).and_then(|mut mesh| {
            mesh.validate()?;
            mesh.ensure_normals();
            Ok(mesh)
        }) {
            Ok(mesh) => {
                log::debug!("mesh {id} `{name}`: {} triangles", mesh.triangle_count());
                self.meshes.push(Some(mesh));
                Ok(id)
            }
            Err(err) => {
                self.meshes.push(None);
                Err(err)
            }
        }
    }

    pub fn push(&mut self, mut mesh: TriMesh) -> usize {
        mesh.ensure_normals();
        self.meshes.push(Some(mesh));
        self.meshes.len() - 1
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&TriMesh> {
        self.meshes.get(id).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriMesh {
        TriMesh::new(
            "quad",
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn smooth_normals_follow_winding() {
        let mut mesh = quad();
        mesh.ensure_normals();
        for n in mesh.normals.as_ref().unwrap() {
            assert_eq!(*n, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn validate_rejects_bad_indices() {
        let mut mesh = quad();
        mesh.indices.push(9);
        assert!(mesh.validate().is_err());
        mesh.indices.truncate(6);
        mesh.indices[5] = 7;
        assert!(matches!(mesh.validate(), Err(MeshError::Invalid { .. })));
    }

    #[test]
    fn vertex_lerp_renormalises() {
        let a = Vertex::plain(Point3::ORIGIN, Vec3::X);
        let b = Vertex::new(Point3::new(2.0, 0.0, 0.0), Vec3::Y, [1.0, 1.0]);
        let m = a.lerp(b, 0.5);
        assert_eq!(m.position, Point3::new(1.0, 0.0, 0.0));
        assert!((m.normal.length() - 1.0).abs() < 1e-12);
        assert_eq!(m.uv, [0.5, 0.5]);
    }
}
