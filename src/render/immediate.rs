//! Immediate-mode renderer.
//!
//! Drives a [`DrawApi`] (an OpenGL-style begin/vertex/end interface with a
//! matrix stack and quadrics). Nothing is retained beyond what the API holds.
//! [`DisplayList`] records the calls; tests and the web viewer use it.

use serde::Serialize;

use super::drawer::{PassState, TurtleDrawer};
use super::turtle::Turtle;
use super::{Appearance, LineStyle, Material, RenderContext, RenderError, RenderMode, TextureEntry};
use crate::geom::{Point3, TessPrimitive, TessSink, Transform, Vec3, Vertex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Lines,
    Triangles,
    QuadStrip,
    Polygon,
}

pub trait DrawApi {
    fn begin(&mut self, primitive: Primitive);
    fn normal(&mut self, n: Vec3);
    fn tex_coord(&mut self, uv: [f64; 2]);
    fn vertex(&mut self, p: Point3);
    fn end(&mut self);

    fn push_matrix(&mut self);
    fn pop_matrix(&mut self);
    /// Multiplies the current matrix by `m` (column-major).
    fn mult_matrix(&mut self, m: [f64; 16]);

    fn render_mode(&mut self, mode: RenderMode);
    fn depth_test(&mut self, enabled: bool);
    fn material(&mut self, material: &Material);
    fn bind_texture(&mut self, texture: Option<&TextureEntry>);
    fn line_width(&mut self, width: f64);

    /// Sphere of `radius` at the origin.
    fn sphere(&mut self, radius: f64, slices: usize, stacks: usize);
    /// Disc in the XY plane facing +Z.
    fn disk(&mut self, radius: f64, slices: usize);
    /// Cylinder along +Z from the origin.
    fn cylinder(&mut self, base: f64, top: f64, height: f64, slices: usize);
    fn text(&mut self, text: &str);
}

pub struct ImmediateRenderer<A: DrawApi> {
    pass: PassState,
    api: A,
    textured: bool,
}

impl<A: DrawApi> ImmediateRenderer<A> {
    pub fn new(api: A) -> Self {
        Self { pass: PassState::new(), api, textured: false }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_inner(self) -> A {
        self.api
    }

    fn put(&mut self, v: &Vertex) {
        put_vertex(&mut self.api, v, self.textured);
    }

    fn with_matrix(&mut self, transform: Transform, draw: impl FnOnce(&mut A)) {
        self.api.push_matrix();
        self.api.mult_matrix(transform.to_column_major());
        draw(&mut self.api);
        self.api.pop_matrix();
    }
}

fn put_vertex(api: &mut impl DrawApi, v: &Vertex, textured: bool) {
    api.normal(v.normal);
    if textured {
        api.tex_coord(v.uv);
    }
    api.vertex(v.position);
}

/// Feeds tessellator output straight into the drawing API.
struct ApiSink<'a, A: DrawApi> {
    api: &'a mut A,
    textured: bool,
}

impl<A: DrawApi> TessSink for ApiSink<'_, A> {
    fn begin(&mut self, primitive: TessPrimitive) {
        match primitive {
            TessPrimitive::Triangles => self.api.begin(Primitive::Triangles),
        }
    }

    fn vertex(&mut self, vertex: &Vertex) {
        put_vertex(self.api, vertex, self.textured);
    }

    fn end(&mut self) {
        self.api.end();
    }
}

impl<A: DrawApi> TurtleDrawer for ImmediateRenderer<A> {
    fn pass(&mut self) -> &mut PassState {
        &mut self.pass
    }

    fn begin(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        self.api.render_mode(ctx.options.render_mode);
        self.api.depth_test(ctx.options.z_buffer);
        Ok(())
    }

    fn set_appearance(
        &mut self,
        ctx: &RenderContext,
        appearance: Appearance,
    ) -> Result<(), RenderError> {
        self.api.material(ctx.materials.get(appearance.color));
        let texture = appearance.texture.and_then(|t| ctx.textures.get(t));
        self.textured = texture.is_some();
        self.api.bind_texture(texture);
        Ok(())
    }

    fn emit_strip(
        &mut self,
        _ctx: &RenderContext,
        begin: &[Vertex],
        end: &[Vertex],
    ) -> Result<(), RenderError> {
        // Quad strips wind (v0, v1, v3, v2); feeding the end ring first keeps the strip's facing.
        self.api.begin(Primitive::QuadStrip);
        for (b, e) in begin.iter().zip(end) {
            self.put(e);
            self.put(b);
        }
        self.api.end();
        Ok(())
    }

    fn emit_triangles(
        &mut self,
        _ctx: &RenderContext,
        triangles: &[[Vertex; 3]],
    ) -> Result<(), RenderError> {
        if triangles.is_empty() {
            return Ok(());
        }
        self.api.begin(Primitive::Triangles);
        for v in triangles.iter().flatten() {
            self.put(v);
        }
        self.api.end();
        Ok(())
    }

    fn emit_polygon(
        &mut self,
        _ctx: &RenderContext,
        outline: &[Vertex],
    ) -> Result<(), RenderError> {
        self.api.begin(Primitive::Polygon);
        for v in outline {
            self.put(v);
        }
        self.api.end();
        Ok(())
    }

    fn emit_line(
        &mut self,
        _ctx: &RenderContext,
        from: Point3,
        to: Point3,
        _width: f64,
    ) -> Result<(), RenderError> {
        self.api.line_width(1.0);
        self.api.begin(Primitive::Lines);
        self.api.vertex(from);
        self.api.vertex(to);
        self.api.end();
        Ok(())
    }

    fn emit_concave_polygon(
        &mut self,
        _ctx: &RenderContext,
        outline: &[Vertex],
    ) -> Result<(), RenderError> {
        let mut sink = ApiSink { api: &mut self.api, textured: self.textured };
        if let Err(err) = self.pass.tessellator.tessellate_with(outline, &mut sink) {
            log::warn!("polygon skipped: {err}");
        }
        Ok(())
    }

    fn segment(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        length: f64,
    ) -> Result<(), RenderError> {
        let frame = turtle.frame;
        match ctx.options.line_style {
            LineStyle::Pixel => {
                let to = frame.position + frame.heading * length;
                self.emit_line(ctx, frame.position, to, frame.scale.p * 2.0)
            }
            LineStyle::Polygon => {
                self.emit_polygon(ctx, &crate::geom::quadric::ribbon(&frame, frame.scale.p, length))
            }
            LineStyle::Cylinder => {
                let radius = frame.scale.p.abs();
                let slices = ctx.options.slices();
                self.with_matrix(frame.transform(), |api| {
                    api.cylinder(radius, radius, length, slices);
                });
                Ok(())
            }
        }
    }

    fn circle(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        let frame = turtle.frame;
        let slices = ctx.options.slices();
        let facing_up = Transform::from_axes(frame.position, frame.heading, frame.left, frame.up);
        self.with_matrix(facing_up, |api| api.disk(diameter * 0.5, slices));
        Ok(())
    }

    fn sphere(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        let slices = ctx.options.slices();
        self.with_matrix(turtle.frame.transform(), |api| {
            api.sphere(diameter * 0.5, slices, (slices / 2).max(2));
        });
        Ok(())
    }

    fn label(
        &mut self,
        _ctx: &RenderContext,
        turtle: &Turtle,
        text: &str,
    ) -> Result<(), RenderError> {
        self.with_matrix(turtle.frame.transform(), |api| api.text(text));
        Ok(())
    }
}

/// One recorded [`DrawApi`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum DrawCall {
    Begin { primitive: Primitive },
    Normal { n: [f64; 3] },
    TexCoord { uv: [f64; 2] },
    Vertex { p: [f64; 3] },
    End,
    PushMatrix,
    PopMatrix,
    MultMatrix { m: Vec<f64> },
    RenderMode { mode: RenderMode },
    DepthTest { enabled: bool },
    Material {
        diffuse: [f64; 3],
        specular: [f64; 3],
        emission: [f64; 3],
        shininess: f64,
        transparency: f64,
    },
    BindTexture { file: Option<String> },
    LineWidth { width: f64 },
    Sphere { radius: f64, slices: usize, stacks: usize },
    Disk { radius: f64, slices: usize },
    Cylinder { base: f64, top: f64, height: f64, slices: usize },
    Text { text: String },
}

/// [`DrawApi`] that records every call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayList {
    pub calls: Vec<DrawCall>,
}

impl DisplayList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `vertex` calls.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, DrawCall::Vertex { .. })).count()
    }

    /// Number of primitives of `kind` begun.
    #[must_use]
    pub fn count(&self, kind: Primitive) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DrawCall::Begin { primitive } if *primitive == kind))
            .count()
    }
}

impl DrawApi for DisplayList {
    fn begin(&mut self, primitive: Primitive) {
        self.calls.push(DrawCall::Begin { primitive });
    }

    fn normal(&mut self, n: Vec3) {
        self.calls.push(DrawCall::Normal { n: n.to_array() });
    }

    fn tex_coord(&mut self, uv: [f64; 2]) {
        self.calls.push(DrawCall::TexCoord { uv });
    }

    fn vertex(&mut self, p: Point3) {
        self.calls.push(DrawCall::Vertex { p: p.to_array() });
    }

    fn end(&mut self) {
        self.calls.push(DrawCall::End);
    }

    fn push_matrix(&mut self) {
        self.calls.push(DrawCall::PushMatrix);
    }

    fn pop_matrix(&mut self) {
        self.calls.push(DrawCall::PopMatrix);
    }

    fn mult_matrix(&mut self, m: [f64; 16]) {
        self.calls.push(DrawCall::MultMatrix { m: m.to_vec() });
    }

    fn render_mode(&mut self, mode: RenderMode) {
        self.calls.push(DrawCall::RenderMode { mode });
    }

    fn depth_test(&mut self, enabled: bool) {
        self.calls.push(DrawCall::DepthTest { enabled });
    }

    fn material(&mut self, material: &Material) {
        let rgb = |c: super::Rgb| [c.r, c.g, c.b];
        self.calls.push(DrawCall::Material {
            diffuse: rgb(material.diffuse),
            specular: rgb(material.specular),
            emission: rgb(material.emissive),
            shininess: material.shininess,
            transparency: material.transparency,
        });
    }

    fn bind_texture(&mut self, texture: Option<&TextureEntry>) {
        self.calls.push(DrawCall::BindTexture { file: texture.map(|t| t.file.clone()) });
    }

    fn line_width(&mut self, width: f64) {
        self.calls.push(DrawCall::LineWidth { width });
    }

    fn sphere(&mut self, radius: f64, slices: usize, stacks: usize) {
        self.calls.push(DrawCall::Sphere { radius, slices, stacks });
    }

    fn disk(&mut self, radius: f64, slices: usize) {
        self.calls.push(DrawCall::Disk { radius, slices });
    }

    fn cylinder(&mut self, base: f64, top: f64, height: f64, slices: usize) {
        self.calls.push(DrawCall::Cylinder { base, top, height, slices });
    }

    fn text(&mut self, text: &str) {
        self.calls.push(DrawCall::Text { text: text.to_owned() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TurtleCommand, run_pass};

    fn record(ctx: &RenderContext, commands: &[TurtleCommand]) -> DisplayList {
        let mut renderer = ImmediateRenderer::new(DisplayList::new());
        run_pass(ctx, commands, &mut renderer).unwrap();
        renderer.into_inner()
    }

    #[test]
    fn generalized_cylinder_is_one_quad_strip() {
        let ctx = RenderContext::new();
        let list = record(
            &ctx,
            &[
                TurtleCommand::StartGc,
                TurtleCommand::Forward { distance: 1.0 },
                TurtleCommand::EndGc,
            ],
        );
        assert_eq!(list.count(Primitive::QuadStrip), 1);
        assert_eq!(list.vertex_count(), 2 * crate::geom::DEFAULT_DIVISIONS);
    }

    #[test]
    fn concave_polygon_streams_triangles() {
        let mut ctx = RenderContext::new();
        ctx.options.concave_polygons = true;
        // An L-shaped outline traced by the turtle.
        let mut commands = vec![TurtleCommand::StartPolygon, TurtleCommand::PolygonPoint];
        let steps = [(2.0, 90.0), (1.0, 90.0), (1.0, -90.0), (1.0, 90.0), (1.0, 90.0)];
        for (distance, angle) in steps {
            commands.push(TurtleCommand::Forward { distance });
            commands.push(TurtleCommand::Turn { angle });
        }
        commands.push(TurtleCommand::EndPolygon);
        let list = record(&ctx, &commands);
        assert_eq!(list.count(Primitive::Triangles), 1);
        assert_eq!(list.count(Primitive::Polygon), 0);
        // Six corners, four triangles.
        assert_eq!(list.vertex_count(), 12);
    }

    #[test]
    fn quadric_shapes_use_the_matrix_stack() {
        let mut ctx = RenderContext::new();
        ctx.options.line_style = LineStyle::Cylinder;
        let list = record(
            &ctx,
            &[TurtleCommand::Forward { distance: 1.0 }, TurtleCommand::Sphere { diameter: 0.5 }],
        );
        let pushes = list.calls.iter().filter(|c| matches!(c, DrawCall::PushMatrix)).count();
        let pops = list.calls.iter().filter(|c| matches!(c, DrawCall::PopMatrix)).count();
        assert_eq!(pushes, 2);
        assert_eq!(pops, 2);
        let cylinder = DrawCall::Cylinder { base: 0.5, top: 0.5, height: 1.0, slices: 12 };
        assert!(list.calls.contains(&cylinder));
    }
}
