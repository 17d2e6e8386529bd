//! Wavefront OBJ + MTL writer.
//!
//! Every primitive is expressed as indices into an [`ObjOutputStore`], which
//! welds positions, normals and texture coordinates against the most recent
//! [`DEDUP_WINDOW`] entries of each array. Welding only looks backwards, so
//! the output depends on emission order.

use std::collections::HashSet;
use std::io::Write;

use super::drawer::{PassState, TurtleDrawer};
use super::{Appearance, Material, RenderContext, RenderError, material_name};
use crate::geom::{BBox, Point3, Tolerance, Vec3, Vertex};

/// Number of most recent entries searched when welding.
pub const DEDUP_WINDOW: usize = 128;

/// Deduplicated OBJ arrays for one pass. Indices are zero-based.
#[derive(Debug, Clone, Default)]
pub struct ObjOutputStore {
    vertices: Vec<[f64; 3]>,
    normals: Vec<[f64; 3]>,
    texcoords: Vec<[f64; 2]>,
    tolerance: f64,
    groups: usize,
    materials: HashSet<String>,
}

/// Index of a welded entry and whether the request appended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Welded {
    pub index: usize,
    pub is_new: bool,
}

impl ObjOutputStore {
    /// Store whose position tolerance is [`Tolerance::WELD_RELATIVE`] times the
    /// diagonal of `bounds`.
    #[must_use]
    pub fn new(bounds: Option<BBox>) -> Self {
        let diagonal = bounds.map_or(0.0, BBox::diagonal);
        Self {
            tolerance: Tolerance::WELD_RELATIVE.scaled(diagonal).eps.max(Tolerance::ZERO_LENGTH.eps),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    #[must_use]
    pub fn normals(&self) -> &[[f64; 3]] {
        &self.normals
    }

    #[must_use]
    pub fn texcoords(&self) -> &[[f64; 2]] {
        &self.texcoords
    }

    pub fn insert_vertex(&mut self, p: Point3) -> Welded {
        weld(&mut self.vertices, p.to_array(), self.tolerance)
    }

    /// Normals are unit length, so they weld at the unscaled tolerance.
    pub fn insert_normal(&mut self, n: Vec3) -> Welded {
        weld(&mut self.normals, n.to_array(), Tolerance::WELD_RELATIVE.eps)
    }

    pub fn insert_texcoord(&mut self, uv: [f64; 2]) -> Welded {
        weld(&mut self.texcoords, uv, Tolerance::WELD_RELATIVE.eps)
    }

    pub fn next_group(&mut self) -> usize {
        self.groups += 1;
        self.groups
    }

    /// Records a material name; true the first time it is seen this pass.
    ///
    /// Appearances that resolve to the same name share one record.
    pub fn first_use(&mut self, name: &str) -> bool {
        if self.materials.contains(name) {
            return false;
        }
        self.materials.insert(name.to_owned())
    }
}

/// O([`DEDUP_WINDOW`]) backward search; appends `value` when nothing is within `tolerance`.
fn weld<const N: usize>(entries: &mut Vec<[f64; N]>, value: [f64; N], tolerance: f64) -> Welded {
    let tol2 = tolerance * tolerance;
    let start = entries.len().saturating_sub(DEDUP_WINDOW);
    for index in (start..entries.len()).rev() {
        let d2: f64 = entries[index].iter().zip(&value).map(|(a, b)| (a - b) * (a - b)).sum();
        if d2 <= tol2 {
            return Welded { index, is_new: false };
        }
    }
    entries.push(value);
    Welded { index: entries.len() - 1, is_new: true }
}

#[derive(Debug, Clone, Copy)]
struct FaceCorner {
    v: usize,
    t: Option<usize>,
    n: usize,
}

pub struct ObjWriter<W: Write, M: Write> {
    pass: PassState,
    obj: W,
    mtl: M,
    mtl_file: String,
    store: ObjOutputStore,
    appearance: Appearance,
    written: Option<Appearance>,
}

impl<W: Write, M: Write> ObjWriter<W, M> {
    /// `mtl_file` is the name the geometry stream references in `mtllib`;
    /// `bounds` (from a bounding pass) sets the weld tolerance.
    pub fn new(obj: W, mtl: M, mtl_file: impl Into<String>, bounds: Option<BBox>) -> Self {
        Self {
            pass: PassState::new(),
            obj,
            mtl,
            mtl_file: mtl_file.into(),
            store: ObjOutputStore::new(bounds),
            appearance: Appearance::default(),
            written: None,
        }
    }

    #[must_use]
    pub fn store(&self) -> &ObjOutputStore {
        &self.store
    }

    pub fn into_inner(self) -> (W, M) {
        (self.obj, self.mtl)
    }

    /// Writes `usemtl` (and the MTL entry on first use) when the appearance changed.
    fn sync_material(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        if self.written == Some(self.appearance) {
            return Ok(());
        }
        let name = material_name(ctx, self.appearance);
        if self.store.first_use(&name) {
            let texture = self.appearance.texture.and_then(|t| ctx.textures.get(t));
            let material = ctx.materials.get(self.appearance.color);
            write_mtl_entry(&mut self.mtl, &name, material, texture.map(|t| t.file.as_str()))?;
        }
        let group = self.store.next_group();
        writeln!(self.obj, "g part_{group:04}")?;
        writeln!(self.obj, "usemtl {name}")?;
        self.written = Some(self.appearance);
        Ok(())
    }

    fn corner(&mut self, v: &Vertex) -> Result<FaceCorner, RenderError> {
        let p = self.store.insert_vertex(v.position);
        if p.is_new {
            let [x, y, z] = v.position.to_array();
            writeln!(self.obj, "v {x} {y} {z}")?;
        }
        let t = match self.appearance.texture {
            Some(_) => {
                let t = self.store.insert_texcoord(v.uv);
                if t.is_new {
                    writeln!(self.obj, "vt {} {}", v.uv[0], v.uv[1])?;
                }
                Some(t.index)
            }
            None => None,
        };
        let n = self.store.insert_normal(v.normal);
        if n.is_new {
            let [x, y, z] = v.normal.to_array();
            writeln!(self.obj, "vn {x} {y} {z}")?;
        }
        Ok(FaceCorner { v: p.index, t, n: n.index })
    }

    /// Writes one face, dropping corners welded onto their predecessor.
    fn face(&mut self, ctx: &RenderContext, vertices: &[Vertex]) -> Result<(), RenderError> {
        let mut corners: Vec<FaceCorner> = Vec::with_capacity(vertices.len());
        for v in vertices {
            let corner = self.corner(v)?;
            if corners.last().is_none_or(|last| last.v != corner.v) {
                corners.push(corner);
            }
        }
        if corners.len() > 1 && corners[0].v == corners[corners.len() - 1].v {
            corners.pop();
        }
        if corners.len() < 3 {
            return Ok(());
        }
        self.sync_material(ctx)?;
        write!(self.obj, "f")?;
        for c in &corners {
            match c.t {
                Some(t) => write!(self.obj, " {}/{}/{}", c.v + 1, t + 1, c.n + 1)?,
                None => write!(self.obj, " {}//{}", c.v + 1, c.n + 1)?,
            }
        }
        writeln!(self.obj)?;
        Ok(())
    }
}

fn write_mtl_entry(
    mtl: &mut impl Write,
    name: &str,
    material: &Material,
    texture: Option<&str>,
) -> Result<(), RenderError> {
    let rgb = |c: super::Rgb| format!("{} {} {}", c.r, c.g, c.b);
    writeln!(mtl, "newmtl {name}")?;
    writeln!(mtl, "Ka {}", rgb(material.ambient))?;
    writeln!(mtl, "Kd {}", rgb(material.diffuse))?;
    writeln!(mtl, "Ks {}", rgb(material.specular))?;
    writeln!(mtl, "Ke {}", rgb(material.emissive))?;
    writeln!(mtl, "Ns {}", material.shininess)?;
    writeln!(mtl, "d {}", 1.0 - material.transparency)?;
    writeln!(mtl, "illum 2")?;
    if let Some(file) = texture {
        writeln!(mtl, "map_Kd {file}")?;
    }
    writeln!(mtl)?;
    Ok(())
}

impl<W: Write, M: Write> TurtleDrawer for ObjWriter<W, M> {
    fn pass(&mut self) -> &mut PassState {
        &mut self.pass
    }

    fn begin(&mut self, _ctx: &RenderContext) -> Result<(), RenderError> {
        writeln!(self.obj, "# lsys-render")?;
        writeln!(self.obj, "mtllib {}", self.mtl_file)?;
        writeln!(self.mtl, "# lsys-render")?;
        Ok(())
    }

    fn finish(&mut self, _ctx: &RenderContext) -> Result<(), RenderError> {
        log::debug!(
            "obj pass: {} vertices, {} normals, {} texcoords",
            self.store.vertices.len(),
            self.store.normals.len(),
            self.store.texcoords.len()
        );
        self.obj.flush()?;
        self.mtl.flush()?;
        Ok(())
    }

    fn set_appearance(
        &mut self,
        _ctx: &RenderContext,
        appearance: Appearance,
    ) -> Result<(), RenderError> {
        self.appearance = appearance;
        Ok(())
    }

    fn emit_strip(
        &mut self,
        ctx: &RenderContext,
        begin: &[Vertex],
        end: &[Vertex],
    ) -> Result<(), RenderError> {
        for i in 0..begin.len().min(end.len()).saturating_sub(1) {
            self.face(ctx, &[begin[i], begin[i + 1], end[i + 1], end[i]])?;
        }
        Ok(())
    }

    fn emit_triangles(
        &mut self,
        ctx: &RenderContext,
        triangles: &[[Vertex; 3]],
    ) -> Result<(), RenderError> {
        for tri in triangles {
            self.face(ctx, tri)?;
        }
        Ok(())
    }

    fn emit_polygon(&mut self, ctx: &RenderContext, outline: &[Vertex]) -> Result<(), RenderError> {
        self.face(ctx, outline)
    }

    fn emit_line(
        &mut self,
        ctx: &RenderContext,
        from: Point3,
        to: Point3,
        _width: f64,
    ) -> Result<(), RenderError> {
        let a = self.store.insert_vertex(from);
        if a.is_new {
            writeln!(self.obj, "v {} {} {}", from.x, from.y, from.z)?;
        }
        let b = self.store.insert_vertex(to);
        if b.is_new {
            writeln!(self.obj, "v {} {} {}", to.x, to.y, to.z)?;
        }
        if a.index != b.index {
            self.sync_material(ctx)?;
            writeln!(self.obj, "l {} {}", a.index + 1, b.index + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TurtleCommand, run_pass};

    #[test]
    fn close_points_share_one_entry() {
        let bounds = BBox::new(Point3::ORIGIN, Point3::new(10.0, 0.0, 0.0));
        let mut store = ObjOutputStore::new(Some(bounds));
        let a = store.insert_vertex(Point3::new(1.0, 2.0, 3.0));
        let b = store.insert_vertex(Point3::new(1.0 + store.tolerance() * 0.5, 2.0, 3.0));
        assert!(a.is_new);
        assert!(!b.is_new);
        assert_eq!(a.index, b.index);
        assert_eq!(store.vertices().len(), 1);
    }

    #[test]
    fn far_points_get_separate_entries() {
        let unit = BBox::new(Point3::ORIGIN, Point3::new(1.0, 1.0, 1.0));
        let mut store = ObjOutputStore::new(Some(unit));
        let a = store.insert_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = store.insert_vertex(Point3::new(0.1, 0.0, 0.0));
        assert_ne!(a.index, b.index);
        assert_eq!(store.vertices().len(), 2);
    }

    #[test]
    fn normals_and_texcoords_weld_at_the_unscaled_tolerance() {
        let huge = BBox::new(Point3::ORIGIN, Point3::new(1.0e6, 0.0, 0.0));
        let mut store = ObjOutputStore::new(Some(huge));
        let a = store.insert_normal(Vec3::X);
        let b = store.insert_normal(Vec3::new(1.0, 1.0e-3, 0.0));
        assert_ne!(a.index, b.index);
        assert!(!store.insert_normal(Vec3::X).is_new);

        let t = store.insert_texcoord([0.25, 0.5]);
        assert!(!store.insert_texcoord([0.25, 0.5]).is_new);
        assert_ne!(store.insert_texcoord([0.25, 0.501]).index, t.index);
        assert_eq!(store.normals().len(), 2);
        assert_eq!(store.texcoords().len(), 2);
    }

    #[test]
    fn welding_only_searches_the_window() {
        let mut store = ObjOutputStore::new(None);
        let first = store.insert_vertex(Point3::ORIGIN);
        for i in 1..=DEDUP_WINDOW {
            store.insert_vertex(Point3::new(i as f64, 0.0, 0.0));
        }
        let again = store.insert_vertex(Point3::ORIGIN);
        assert!(again.is_new);
        assert_ne!(again.index, first.index);
    }

    #[test]
    fn textured_materials_follow_solid_ones() {
        let mut ctx = RenderContext::new();
        ctx.textures.insert(crate::render::TextureEntry { id: 4, file: "bark.png".into() });
        let solid = material_name(&ctx, Appearance { color: 2, texture: None });
        let textured = material_name(&ctx, Appearance { color: 2, texture: Some(4) });
        assert_eq!(solid, "mat_0002");
        assert_eq!(textured, format!("mat_{:04}", ctx.materials.len() + 2));
    }

    fn render(ctx: &RenderContext, commands: &[TurtleCommand]) -> (String, String) {
        let mut writer = ObjWriter::new(Vec::new(), Vec::new(), "plant.mtl", None);
        run_pass(ctx, commands, &mut writer).unwrap();
        let (obj, mtl) = writer.into_inner();
        (String::from_utf8(obj).unwrap(), String::from_utf8(mtl).unwrap())
    }

    #[test]
    fn appearances_sharing_a_name_share_one_material() {
        let ctx = RenderContext::new();
        let (obj, mtl) = render(
            &ctx,
            &[
                TurtleCommand::SetColor { index: 2 },
                TurtleCommand::Sphere { diameter: 1.0 },
                TurtleCommand::SetColor { index: 2 + ctx.materials.len() },
                TurtleCommand::Sphere { diameter: 1.0 },
                TurtleCommand::SetTexture { id: Some(99) },
                TurtleCommand::Sphere { diameter: 1.0 },
            ],
        );
        assert_eq!(mtl.matches("newmtl mat_0002").count(), 1);
        assert_eq!(mtl.matches("newmtl").count(), 1);
        assert!(obj.contains("usemtl mat_0002"));
    }

    #[test]
    fn textured_cylinder_writes_texture_coordinates() {
        let mut ctx = RenderContext::new();
        ctx.textures.insert(crate::render::TextureEntry { id: 1, file: "bark.png".into() });
        let (obj, mtl) = render(
            &ctx,
            &[
                TurtleCommand::SetTexture { id: Some(1) },
                TurtleCommand::StartGc,
                TurtleCommand::Forward { distance: 2.0 },
                TurtleCommand::EndGc,
            ],
        );
        assert!(mtl.contains("map_Kd bark.png"));
        assert!(obj.lines().any(|l| l.starts_with("vt ")));
        let faces: Vec<&str> = obj.lines().filter(|l| l.starts_with("f ")).collect();
        assert_eq!(faces.len(), 7);
        for face in faces {
            for corner in face.split_whitespace().skip(1) {
                let refs: Vec<&str> = corner.split('/').collect();
                assert_eq!(refs.len(), 3, "{face}");
                assert!(refs.iter().all(|r| r.parse::<usize>().is_ok()), "{face}");
            }
        }
    }

    #[test]
    fn cylinder_pass_writes_quads_and_one_material() {
        let ctx = RenderContext::new();
        let commands = [
            TurtleCommand::StartGc,
            TurtleCommand::Forward { distance: 2.0 },
            TurtleCommand::SetColor { index: 0 },
            TurtleCommand::EndGc,
        ];
        let mut writer = ObjWriter::new(Vec::new(), Vec::new(), "plant.mtl", None);
        run_pass(&ctx, &commands, &mut writer).unwrap();
        let (obj, mtl) = writer.into_inner();
        let obj = String::from_utf8(obj).unwrap();
        let mtl = String::from_utf8(mtl).unwrap();
        assert!(obj.contains("mtllib plant.mtl"));
        // Circle contour: 8 samples, 7 distinct, the seam welds onto sample 0.
        assert_eq!(obj.lines().filter(|l| l.starts_with("v ")).count(), 14);
        assert_eq!(obj.lines().filter(|l| l.starts_with("f ")).count(), 7);
        assert_eq!(mtl.matches("newmtl").count(), 1);
        assert_eq!(obj.matches("usemtl").count(), 1);
    }
}
