//! Encapsulated PostScript writer.
//!
//! Points go through the camera rotation, then a uniform scale and
//! translation that fits the scene onto a fixed page. PostScript has no depth
//! buffer, so every primitive is buffered in a [`PainterStore`] with the
//! camera-space depth of a representative point and written back to front in
//! `finish`.

use std::io::Write;

use super::drawer::{PassState, TurtleDrawer};
use super::turtle::Turtle;
use super::{Appearance, RenderContext, RenderError, RenderMode, Rgb};
use crate::geom::{BBox, Point3, Transform, Vec3, Vertex};

/// Page size in points (US letter).
pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;
const PAGE_MARGIN: f64 = 36.0;

#[derive(Debug, Clone, PartialEq)]
pub enum PsPrimitive {
    Polygon { points: Vec<[f64; 2]>, fill: Option<Rgb>, stroke: Option<(Rgb, f64)> },
    Line { from: [f64; 2], to: [f64; 2], color: Rgb, width: f64 },
    Disc { centre: [f64; 2], radius: f64, color: Rgb },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PainterEntry {
    /// Camera-space Z; smaller is further from the eye.
    pub depth: f64,
    pub primitive: PsPrimitive,
}

/// Buffered primitives of one page.
#[derive(Debug, Clone, Default)]
pub struct PainterStore {
    entries: Vec<PainterEntry>,
}

impl PainterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, depth: f64, primitive: PsPrimitive) {
        self.entries.push(PainterEntry { depth, primitive });
    }

    /// Orders entries back to front (ascending depth); keeps emission order when `sort` is off.
    pub fn finish(&mut self, sort: bool) {
        if sort {
            self.entries.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[PainterEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Camera rotation followed by the page fit.
#[derive(Debug, Clone, Copy)]
struct PageProjection {
    camera: Transform,
    scale: f64,
    offset: [f64; 2],
}

impl PageProjection {
    fn new(camera: Transform, bounds: Option<BBox>) -> Self {
        let Some(extent) = bounds.and_then(|b| {
            let corners: Vec<Point3> = b.corners().iter().map(|c| camera.apply_point(*c)).collect();
            BBox::from_points(&corners)
        }) else {
            return Self { camera, scale: 1.0, offset: [PAGE_WIDTH * 0.5, PAGE_HEIGHT * 0.5] };
        };
        let size = extent.size();
        let fit_w = (PAGE_WIDTH - 2.0 * PAGE_MARGIN) / size.x.max(1e-9);
        let fit_h = (PAGE_HEIGHT - 2.0 * PAGE_MARGIN) / size.y.max(1e-9);
        let scale = fit_w.min(fit_h);
        let centre = extent.center();
        Self {
            camera,
            scale,
            offset: [PAGE_WIDTH * 0.5 - centre.x * scale, PAGE_HEIGHT * 0.5 - centre.y * scale],
        }
    }

    /// Page coordinates and camera-space depth.
    fn project(&self, p: Point3) -> ([f64; 2], f64) {
        let c = self.camera.apply_point(p);
        ([c.x * self.scale + self.offset[0], c.y * self.scale + self.offset[1]], c.z)
    }
}

pub struct PostScriptWriter<W: Write> {
    pass: PassState,
    out: W,
    store: PainterStore,
    bounds: Option<BBox>,
    projection: PageProjection,
    light: Option<Vec3>,
    appearance: Appearance,
}

impl<W: Write> PostScriptWriter<W> {
    /// `bounds` comes from a bounding pre-pass and fits the drawing to the page.
    pub fn new(out: W, bounds: Option<BBox>) -> Self {
        Self {
            pass: PassState::new(),
            out,
            store: PainterStore::new(),
            bounds,
            projection: PageProjection::new(Transform::identity(), bounds),
            light: None,
            appearance: Appearance::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &PainterStore {
        &self.store
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Fill colour of a face with `normal` under the current render mode.
    fn shade(&self, ctx: &RenderContext, normal: Vec3) -> Rgb {
        let diffuse = ctx.materials.get(self.appearance.color).diffuse;
        match (ctx.options.render_mode, self.light) {
            (RenderMode::Shaded | RenderMode::FlatShaded, Some(light)) => {
                let n = self.projection.camera.apply_vec(normal).normalized_or(Vec3::Z);
                diffuse.scaled(0.3 + 0.7 * n.dot(light).abs())
            }
            _ => diffuse,
        }
    }

    fn face(&mut self, ctx: &RenderContext, vertices: &[&Vertex]) {
        if vertices.len() < 3 {
            return;
        }
        let mut points = Vec::with_capacity(vertices.len());
        let mut depth = 0.0;
        let mut normal = Vec3::ZERO;
        for v in vertices {
            let (p, z) = self.projection.project(v.position);
            points.push(p);
            depth += z;
            normal += v.normal;
        }
        depth /= vertices.len() as f64;
        let fill_color = self.shade(ctx, normal);
        let outline = ctx.options.outline_width;
        let (fill, stroke) = match ctx.options.render_mode {
            RenderMode::Wireframe => (None, Some((fill_color, outline.max(0.1)))),
            _ if outline > 0.0 => (Some(fill_color), Some((fill_color.scaled(0.5), outline))),
            _ => (Some(fill_color), None),
        };
        self.store.push(depth, PsPrimitive::Polygon { points, fill, stroke });
    }
}

fn set_color(out: &mut impl Write, c: Rgb) -> std::io::Result<()> {
    writeln!(
        out,
        "{:.3} {:.3} {:.3} setrgbcolor",
        c.r.clamp(0.0, 1.0),
        c.g.clamp(0.0, 1.0),
        c.b.clamp(0.0, 1.0)
    )
}

fn write_primitive(out: &mut impl Write, primitive: &PsPrimitive) -> std::io::Result<()> {
    match primitive {
        PsPrimitive::Polygon { points, fill, stroke } => {
            let mut path = String::from("newpath");
            for (i, [x, y]) in points.iter().enumerate() {
                let op = if i == 0 { "moveto" } else { "lineto" };
                path.push_str(&format!(" {x:.2} {y:.2} {op}"));
            }
            path.push_str(" closepath");
            if let Some(fill) = fill {
                set_color(out, *fill)?;
                writeln!(out, "{path} fill")?;
            }
            if let Some((c, width)) = stroke {
                set_color(out, *c)?;
                writeln!(out, "{width:.2} setlinewidth {path} stroke")?;
            }
        }
        PsPrimitive::Line { from, to, color: c, width } => {
            set_color(out, *c)?;
            writeln!(
                out,
                "{width:.2} setlinewidth newpath {:.2} {:.2} moveto {:.2} {:.2} lineto stroke",
                from[0], from[1], to[0], to[1]
            )?;
        }
        PsPrimitive::Disc { centre, radius, color: c } => {
            set_color(out, *c)?;
            let [x, y] = centre;
            writeln!(out, "newpath {x:.2} {y:.2} {radius:.2} 0 360 arc closepath fill")?;
        }
    }
    Ok(())
}

impl<W: Write> TurtleDrawer for PostScriptWriter<W> {
    fn pass(&mut self) -> &mut PassState {
        &mut self.pass
    }

    fn begin(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        let view = match self.bounds {
            Some(bounds) => ctx.view.framed(bounds),
            None => ctx.view.clone(),
        };
        let camera = view.camera_or_default();
        self.projection = PageProjection::new(camera, self.bounds);
        self.light = view
            .lights
            .first()
            .and_then(|l| camera.apply_vec(Vec3::from_array(l.direction)).normalized());
        self.store.clear();

        writeln!(self.out, "%!PS-Adobe-3.0 EPSF-3.0")?;
        writeln!(self.out, "%%BoundingBox: 0 0 {} {}", PAGE_WIDTH, PAGE_HEIGHT)?;
        writeln!(self.out, "%%Creator: lsys-render")?;
        writeln!(self.out, "%%EndComments")?;
        writeln!(
            self.out,
            "newpath 0 0 moveto {w} 0 lineto {w} {h} lineto 0 {h} lineto closepath clip",
            w = PAGE_WIDTH,
            h = PAGE_HEIGHT
        )?;
        writeln!(self.out, "1 setlinejoin 1 setlinecap")?;
        Ok(())
    }

    fn finish(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        self.store.finish(ctx.options.z_buffer);
        for entry in self.store.entries() {
            write_primitive(&mut self.out, &entry.primitive)?;
        }
        writeln!(self.out, "showpage")?;
        writeln!(self.out, "%%EOF")?;
        self.out.flush()?;
        log::debug!("postscript pass: {} primitives", self.store.len());
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
            self.face(ctx, &[&begin[i], &begin[i + 1], &end[i + 1], &end[i]]);
        }
        Ok(())
    }

    fn emit_triangles(
        &mut self,
        ctx: &RenderContext,
        triangles: &[[Vertex; 3]],
    ) -> Result<(), RenderError> {
        for [a, b, c] in triangles {
            self.face(ctx, &[a, b, c]);
        }
        Ok(())
    }

    fn emit_polygon(&mut self, ctx: &RenderContext, outline: &[Vertex]) -> Result<(), RenderError> {
        let refs: Vec<&Vertex> = outline.iter().collect();
        self.face(ctx, &refs);
        Ok(())
    }

    fn emit_line(
        &mut self,
        ctx: &RenderContext,
        from: Point3,
        to: Point3,
        width: f64,
    ) -> Result<(), RenderError> {
        let (a, za) = self.projection.project(from);
        let (b, zb) = self.projection.project(to);
        let color = ctx.materials.get(self.appearance.color).diffuse;
        let width = (width * self.projection.scale).max(ctx.options.outline_width);
        self.store.push((za + zb) * 0.5, PsPrimitive::Line { from: a, to: b, color, width });
        Ok(())
    }

    fn sphere(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        let (centre, depth) = self.projection.project(turtle.frame.position);
        let color = ctx.materials.get(self.appearance.color).diffuse;
        let radius = diameter.abs() * 0.5 * self.projection.scale;
        self.store.push(depth, PsPrimitive::Disc { centre, radius, color });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::bounds::scene_bounds;
    use crate::render::{TurtleCommand, run_pass};

    fn spheres_along_view_axis() -> Vec<TurtleCommand> {
        // The default camera looks down -Z, so pitching up walks towards the eye.
        vec![
            TurtleCommand::Pitch { angle: -90.0 },
            TurtleCommand::Sphere { diameter: 1.0 },
            TurtleCommand::Move { distance: 2.0 },
            TurtleCommand::Sphere { diameter: 1.0 },
            TurtleCommand::TurnAround,
            TurtleCommand::Move { distance: 6.0 },
            TurtleCommand::Sphere { diameter: 1.0 },
        ]
    }

    fn run(ctx: &RenderContext, commands: &[TurtleCommand]) -> PostScriptWriter<Vec<u8>> {
        let bounds = scene_bounds(ctx, commands).unwrap();
        let mut writer = PostScriptWriter::new(Vec::new(), bounds);
        run_pass(ctx, commands, &mut writer).unwrap();
        writer
    }

    #[test]
    fn painter_store_is_back_to_front() {
        let ctx = RenderContext::new();
        let writer = run(&ctx, &spheres_along_view_axis());
        let depths: Vec<f64> = writer.store().entries().iter().map(|e| e.depth).collect();
        assert_eq!(depths.len(), 3);
        assert!(depths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unsorted_store_keeps_emission_order() {
        let mut ctx = RenderContext::new();
        ctx.options.z_buffer = false;
        let writer = run(&ctx, &spheres_along_view_axis());
        let depths: Vec<f64> = writer.store().entries().iter().map(|e| e.depth).collect();
        assert!(depths[0] < depths[1]);
        assert!(depths[1] > depths[2]);
    }

    #[test]
    fn output_has_header_and_trailer() {
        let ctx = RenderContext::new();
        let writer = run(&ctx, &[TurtleCommand::Forward { distance: 1.0 }]);
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.starts_with("%!PS-Adobe-3.0 EPSF-3.0\n%%BoundingBox: 0 0 612 792"));
        assert!(text.contains("closepath clip"));
        assert!(text.contains("lineto stroke"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn manual_store_sorts_by_depth() {
        let mut store = PainterStore::new();
        let disc = |r| PsPrimitive::Disc { centre: [0.0, 0.0], radius: r, color: Rgb::WHITE };
        store.push(-1.0, disc(1.0));
        store.push(-5.0, disc(2.0));
        store.push(-3.0, disc(3.0));
        store.finish(true);
        let depths: Vec<f64> = store.entries().iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![-5.0, -3.0, -1.0]);
    }
}
