//! Rayshade scene writer.
//!
//! Geometry goes into a named aggregate (`grid` when sized, else `list`)
//! that is instanced once with `object`. All coordinates are world space.
//! A `surface` record is written the first time its (colour, texture) pair
//! is used; the aggregate body is buffered so those definitions precede it.

use std::collections::HashSet;
use std::io::Write;

use super::drawer::{PassState, TurtleDrawer};
use super::turtle::Turtle;
use super::{Appearance, LineStyle, RenderContext, RenderError, Rgb, material_name};
use crate::geom::{BBox, Point3, Tolerance, Vec3, Vertex};

/// Largest automatic grid resolution per axis.
const MAX_AUTO_GRID: usize = 32;

pub struct RayshadeWriter<W: Write> {
    pass: PassState,
    out: W,
    body: Vec<u8>,
    bounds: Option<BBox>,
    appearance: Appearance,
    surface: String,
    defined: HashSet<String>,
    primitives: usize,
}

fn p3(p: Point3) -> String {
    format!("{} {} {}", p.x, p.y, p.z)
}

fn v3(v: Vec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

fn rgb(c: Rgb) -> String {
    format!("{} {} {}", c.r, c.g, c.b)
}

impl<W: Write> RayshadeWriter<W> {
    /// `bounds` comes from a bounding pre-pass; it sizes the grid and the `box` record.
    pub fn new(out: W, bounds: Option<BBox>) -> Self {
        Self {
            pass: PassState::new(),
            out,
            body: Vec::new(),
            bounds,
            appearance: Appearance::default(),
            surface: String::new(),
            defined: HashSet::new(),
            primitives: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Defines the current surface the first time its name is used.
    fn use_surface(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        if !self.defined.insert(self.surface.clone()) {
            return Ok(());
        }
        let m = ctx.materials.get(self.appearance.color);
        writeln!(
            self.out,
            "surface {}\n\tambient {}\n\tdiffuse {}\n\tspecular {}\n\tspecpow {}\n\ttransp {}",
            self.surface,
            rgb(m.ambient),
            rgb(m.diffuse),
            rgb(m.specular),
            m.shininess.max(1.0),
            m.transparency
        )?;
        Ok(())
    }

    fn texture_suffix(&self, ctx: &RenderContext) -> String {
        self.appearance
            .texture
            .and_then(|t| ctx.textures.get(t))
            .map(|t| format!(" texture image \"{}\"", t.file))
            .unwrap_or_default()
    }

    fn record(&mut self, ctx: &RenderContext, line: &str) -> Result<(), RenderError> {
        self.use_surface(ctx)?;
        let texture = self.texture_suffix(ctx);
        writeln!(self.body, "\t{line}{texture}")?;
        self.primitives += 1;
        Ok(())
    }

    fn triangle(&mut self, ctx: &RenderContext, tri: [&Vertex; 3]) -> Result<(), RenderError> {
        let [a, b, c] = tri;
        let area = (b.position - a.position).cross(c.position - a.position);
        if Tolerance::ZERO_LENGTH.is_zero_vec3(area) {
            return Ok(());
        }
        let line = if self.appearance.texture.is_some() {
            format!(
                "triangleuv {} {} {} {} {} {} {} {} {} {} {} {} {}",
                self.surface,
                p3(a.position), v3(a.normal), a.uv[0], a.uv[1],
                p3(b.position), v3(b.normal), b.uv[0], b.uv[1],
                p3(c.position), v3(c.normal), c.uv[0], c.uv[1],
            )
        } else {
            format!(
                "triangle {} {} {} {} {} {} {}",
                self.surface,
                p3(a.position), v3(a.normal),
                p3(b.position), v3(b.normal),
                p3(c.position), v3(c.normal),
            )
        };
        self.record(ctx, &line)
    }

    fn cylinder(
        &mut self,
        ctx: &RenderContext,
        radius: f64,
        from: Point3,
        to: Point3,
    ) -> Result<(), RenderError> {
        if radius <= 0.0 || from.distance_to(to) <= Tolerance::ZERO_LENGTH.eps {
            return Ok(());
        }
        let line = format!("cylinder {} {} {} {}", self.surface, radius, p3(from), p3(to));
        self.record(ctx, &line)
    }

    fn grid_size(&self, ctx: &RenderContext) -> usize {
        ctx.options.rayshade_grid.unwrap_or_else(|| {
            // Roughly one primitive per voxel.
            ((self.primitives as f64).cbrt().ceil() as usize).clamp(1, MAX_AUTO_GRID)
        })
    }
}

impl<W: Write> TurtleDrawer for RayshadeWriter<W> {
    fn pass(&mut self) -> &mut PassState {
        &mut self.pass
    }

    fn begin(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        let view = match self.bounds {
            Some(bounds) => ctx.view.framed(bounds),
            None => ctx.view.clone(),
        };
        writeln!(self.out, "/* lsys-render */")?;
        writeln!(self.out, "eyep {} {} {}", view.eye[0], view.eye[1], view.eye[2])?;
        writeln!(self.out, "lookp {} {} {}", view.target[0], view.target[1], view.target[2])?;
        writeln!(self.out, "up {} {} {}", view.up[0], view.up[1], view.up[2])?;
        writeln!(self.out, "fov {}", view.fov_degrees)?;
        writeln!(self.out, "background {}", rgb(view.background))?;
        for light in &view.lights {
            let [x, y, z] = light.direction;
            writeln!(self.out, "light {} directional {x} {y} {z}", rgb(light.color))?;
        }
        self.body.clear();
        self.defined.clear();
        self.primitives = 0;
        Ok(())
    }

    fn finish(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        if ctx.options.rayshade_bounds_box {
            if let Some(b) = self.bounds {
                // Defined for reuse by hand-edited scenes; not instanced.
                writeln!(self.out, "name bounds box {} {}", p3(b.min), p3(b.max))?;
            }
        }
        if self.bounds.is_some() && self.primitives > 0 {
            let n = self.grid_size(ctx);
            writeln!(self.out, "name plant grid {n} {n} {n}")?;
        } else {
            writeln!(self.out, "name plant list")?;
        }
        self.out.write_all(&self.body)?;
        writeln!(self.out, "end")?;
        writeln!(self.out, "object plant")?;
        self.out.flush()?;
        log::debug!(
            "rayshade pass: {} primitives, {} surfaces",
            self.primitives,
            self.defined.len()
        );
        Ok(())
    }

    fn set_appearance(
        &mut self,
        ctx: &RenderContext,
        appearance: Appearance,
    ) -> Result<(), RenderError> {
        if appearance != self.appearance || self.surface.is_empty() {
            self.appearance = appearance;
            self.surface = material_name(ctx, appearance);
        }
        Ok(())
    }

    fn emit_strip(
        &mut self,
        ctx: &RenderContext,
        begin: &[Vertex],
        end: &[Vertex],
    ) -> Result<(), RenderError> {
        for i in 0..begin.len().min(end.len()).saturating_sub(1) {
            self.triangle(ctx, [&begin[i], &begin[i + 1], &end[i + 1]])?;
            self.triangle(ctx, [&begin[i], &end[i + 1], &end[i]])?;
        }
        Ok(())
    }

    fn emit_triangles(
        &mut self,
        ctx: &RenderContext,
        triangles: &[[Vertex; 3]],
    ) -> Result<(), RenderError> {
        for tri in triangles {
            self.triangle(ctx, [&tri[0], &tri[1], &tri[2]])?;
        }
        Ok(())
    }

    fn emit_polygon(&mut self, ctx: &RenderContext, outline: &[Vertex]) -> Result<(), RenderError> {
        if outline.len() < 3 {
            return Ok(());
        }
        if self.appearance.texture.is_some() {
            // `poly` carries no texture coordinates; fan it instead.
            for k in 1..outline.len() - 1 {
                self.triangle(ctx, [&outline[0], &outline[k], &outline[k + 1]])?;
            }
            return Ok(());
        }
        let points: Vec<String> = outline.iter().map(|v| p3(v.position)).collect();
        let line = format!("poly {} {}", self.surface, points.join(" "));
        self.record(ctx, &line)
    }

    fn emit_line(
        &mut self,
        ctx: &RenderContext,
        from: Point3,
        to: Point3,
        width: f64,
    ) -> Result<(), RenderError> {
        self.cylinder(ctx, width * 0.5, from, to)
    }

    fn segment(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        length: f64,
    ) -> Result<(), RenderError> {
        let frame = &turtle.frame;
        let to = frame.position + frame.heading * length;
        match ctx.options.line_style {
            LineStyle::Pixel => self.emit_line(ctx, frame.position, to, frame.scale.p * 2.0),
            LineStyle::Polygon => {
                self.emit_polygon(ctx, &crate::geom::quadric::ribbon(frame, frame.scale.p, length))
            }
            LineStyle::Cylinder => self.cylinder(ctx, frame.scale.p.abs(), frame.position, to),
        }
    }

    fn circle(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        let frame = &turtle.frame;
        let line = format!(
            "disc {} {} {} {}",
            self.surface,
            diameter * 0.5,
            p3(frame.position),
            v3(frame.up)
        );
        self.record(ctx, &line)
    }

    fn sphere(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        let centre = p3(turtle.frame.position);
        let line = format!("sphere {} {} {centre}", self.surface, diameter * 0.5);
        self.record(ctx, &line)
    }
}
