//! The command surface every backend implements.
//!
//! Backends implement a handful of primitive emitters (strip, triangles,
//! convex polygon, line) plus the shapes they express natively. The shared
//! logic for generalized cylinders, free polygons, surfaces and meshes lives
//! in the trait's default methods so every backend sees the same geometry.

use super::turtle::{Interpreter, Turtle, TurtleCommand};
use super::{Appearance, LineStyle, RenderContext, RenderError};
use crate::geom::quadric;
use crate::geom::{
    CylinderEngine, GcError, GcPiece, Point3, SurfaceGrid, Tessellator, Vertex, WrappedSurface,
};

/// Pass-scoped mutable state shared by the default methods of [`TurtleDrawer`].
#[derive(Debug, Default)]
pub struct PassState {
    pub cylinder: CylinderEngine,
    /// Outline of the free polygon being recorded, if one is open.
    pub polygon: Option<Vec<Vertex>>,
    pub tessellator: Tessellator,
}

impl PassState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

pub trait TurtleDrawer {
    fn pass(&mut self) -> &mut PassState;

    fn begin(&mut self, _ctx: &RenderContext) -> Result<(), RenderError> {
        Ok(())
    }

    fn finish(&mut self, _ctx: &RenderContext) -> Result<(), RenderError> {
        Ok(())
    }

    fn set_appearance(&mut self, ctx: &RenderContext, appearance: Appearance)
    -> Result<(), RenderError>;

    /// Lateral strip: quad `i` joins `begin[i], begin[i + 1], end[i + 1], end[i]`.
    fn emit_strip(
        &mut self,
        ctx: &RenderContext,
        begin: &[Vertex],
        end: &[Vertex],
    ) -> Result<(), RenderError>;

    fn emit_triangles(
        &mut self,
        ctx: &RenderContext,
        triangles: &[[Vertex; 3]],
    ) -> Result<(), RenderError>;

    /// Convex planar polygon, counter-clockwise around its normal.
    fn emit_polygon(&mut self, ctx: &RenderContext, outline: &[Vertex])
    -> Result<(), RenderError>;

    /// One-pixel line of the `Pixel` line style.
    fn emit_line(
        &mut self,
        ctx: &RenderContext,
        from: Point3,
        to: Point3,
        width: f64,
    ) -> Result<(), RenderError>;

    /// Polygon that may be concave or self-intersecting.
    fn emit_concave_polygon(
        &mut self,
        ctx: &RenderContext,
        outline: &[Vertex],
    ) -> Result<(), RenderError> {
        match self.pass().tessellator.tessellate(outline) {
            Ok(triangles) => self.emit_triangles(ctx, &triangles),
            Err(err) => {
                log::warn!("polygon skipped: {err}");
                Ok(())
            }
        }
    }

    /// Draws a forward move of `length` from the turtle's current position.
    fn segment(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        length: f64,
    ) -> Result<(), RenderError> {
        let frame = &turtle.frame;
        match ctx.options.line_style {
            LineStyle::Pixel => {
                let to = frame.position + frame.heading * length;
                self.emit_line(ctx, frame.position, to, frame.scale.p * 2.0)
            }
            LineStyle::Polygon => {
                self.emit_polygon(ctx, &quadric::ribbon(frame, frame.scale.p, length))
            }
            LineStyle::Cylinder => {
                let (begin, end) =
                    quadric::cylinder_rings(frame, frame.scale.p, length, ctx.options.slices());
                self.emit_strip(ctx, &begin, &end)
            }
        }
    }

    /// Filled disc of `diameter` centred on the turtle, facing its up vector.
    fn circle(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        let outline = quadric::disc_outline(&turtle.frame, diameter * 0.5, ctx.options.slices());
        if ctx.options.concave_polygons {
            self.emit_concave_polygon(ctx, &outline)
        } else {
            self.emit_polygon(ctx, &outline)
        }
    }

    fn sphere(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        let bands = quadric::sphere_bands(&turtle.frame, diameter * 0.5, ctx.options.slices());
        for (begin, end) in bands {
            self.emit_strip(ctx, &begin, &end)?;
        }
        Ok(())
    }

    fn rhombus(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        length: f64,
        width: f64,
    ) -> Result<(), RenderError> {
        self.emit_polygon(ctx, &quadric::rhombus(&turtle.frame, length, width))
    }

    fn triangle(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        length: f64,
        width: f64,
    ) -> Result<(), RenderError> {
        self.emit_polygon(ctx, &quadric::triangle(&turtle.frame, length, width))
    }

    fn label(
        &mut self,
        _ctx: &RenderContext,
        _turtle: &Turtle,
        _text: &str,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    // ── generalized cylinders ────────────────────────────────────────────────

    fn start_gc(&mut self, ctx: &RenderContext, turtle: &Turtle) -> Result<(), RenderError> {
        let settings = turtle.gc_settings(&ctx.options);
        let pass = self.pass();
        let section = turtle.gc_section();
        let result = pass.cylinder.start(&ctx.contours, section, &settings, &mut pass.tessellator);
        self.emit_gc(ctx, "StartGC", result)
    }

    fn point_gc(&mut self, ctx: &RenderContext, turtle: &Turtle) -> Result<(), RenderError> {
        let settings = turtle.gc_settings(&ctx.options);
        let result = self.pass().cylinder.point(&ctx.contours, turtle.gc_section(), &settings);
        self.emit_gc(ctx, "PointGC", result)
    }

    fn end_gc(&mut self, ctx: &RenderContext, turtle: &Turtle) -> Result<(), RenderError> {
        let settings = turtle.gc_settings(&ctx.options);
        let pass = self.pass();
        let section = turtle.gc_section();
        let result = pass.cylinder.end(&ctx.contours, section, &settings, &mut pass.tessellator);
        self.emit_gc(ctx, "EndGC", result)
    }

    fn start_branch(&mut self) {
        self.pass().cylinder.start_branch();
    }

    fn end_branch(&mut self) {
        self.pass().cylinder.end_branch();
    }

    /// Writes the pieces of a cylinder step; engine misuse is logged and ignored.
    fn emit_gc(
        &mut self,
        ctx: &RenderContext,
        op: &str,
        result: Result<Vec<GcPiece>, GcError>,
    ) -> Result<(), RenderError> {
        let pieces = match result {
            Ok(pieces) => pieces,
            Err(err) => {
                log::warn!("{op} ignored: {err}");
                return Ok(());
            }
        };
        for piece in &pieces {
            match piece {
                GcPiece::Strip { begin, end } => self.emit_strip(ctx, begin, end)?,
                GcPiece::Cap { triangles } => self.emit_triangles(ctx, triangles)?,
            }
        }
        Ok(())
    }

    // ── free polygons ────────────────────────────────────────────────────────

    fn start_polygon(&mut self, _ctx: &RenderContext, _turtle: &Turtle) -> Result<(), RenderError> {
        let pass = self.pass();
        if pass.polygon.is_some() {
            log::warn!("StartPolygon ignored: a polygon is already open");
        } else {
            pass.polygon = Some(Vec::new());
        }
        Ok(())
    }

    fn polygon_point(&mut self, _ctx: &RenderContext, turtle: &Turtle) -> Result<(), RenderError> {
        match self.pass().polygon.as_mut() {
            Some(outline) => {
                outline.push(Vertex::plain(turtle.frame.position, turtle.frame.up));
            }
            None => log::warn!("PolygonPoint ignored: no polygon is open"),
        }
        Ok(())
    }

    fn end_polygon(&mut self, ctx: &RenderContext, turtle: &Turtle) -> Result<(), RenderError> {
        let Some(mut outline) = self.pass().polygon.take() else {
            log::warn!("EndPolygon ignored: no polygon is open");
            return Ok(());
        };
        if outline.len() < 3 {
            log::warn!("polygon with {} points skipped", outline.len());
            return Ok(());
        }
        let normal = if ctx.options.auto_normals {
            quadric::polygon_normal(&outline).unwrap_or(turtle.frame.up)
        } else {
            turtle.frame.up
        };
        for vertex in &mut outline {
            vertex.normal = normal;
        }
        if ctx.options.concave_polygons {
            self.emit_concave_polygon(ctx, &outline)
        } else {
            self.emit_polygon(ctx, &outline)
        }
    }

    // ── surfaces and meshes ──────────────────────────────────────────────────

    /// Writes a tessellation grid row by row as strips, mapping every vertex through `place`.
    fn emit_grid(
        &mut self,
        ctx: &RenderContext,
        grid: &SurfaceGrid,
        place: &dyn Fn(Vertex) -> Vertex,
    ) -> Result<(), RenderError> {
        let mut previous: Option<Vec<Vertex>> = None;
        for t in 0..grid.t_count {
            let row: Vec<Vertex> = grid.row(t).iter().map(|v| place(*v)).collect();
            if let Some(below) = previous.as_deref() {
                self.emit_strip(ctx, below, &row)?;
            }
            previous = Some(row);
        }
        Ok(())
    }

    fn surface(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        id: usize,
        scale: f64,
    ) -> Result<(), RenderError> {
        let (Some(surface), Some(grids)) = (ctx.surfaces.get(id), ctx.surface_grids(id)) else {
            log::warn!("surface {id} is not loaded");
            return Ok(());
        };
        let textured = surface.texture.filter(|t| Some(*t) != turtle.appearance.texture);
        if let Some(texture) = textured {
            self.set_appearance(ctx, Appearance { texture: Some(texture), ..turtle.appearance })?;
        }
        for grid in &grids {
            self.emit_grid(ctx, grid, &|v| surface.place(&turtle.frame, scale, v))?;
        }
        if textured.is_some() {
            self.set_appearance(ctx, turtle.appearance)?;
        }
        Ok(())
    }

    fn wrapped_surface(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        id: usize,
        scale: f64,
    ) -> Result<(), RenderError> {
        let Some(grid) = ctx.wrapped_grid(id) else {
            log::warn!("wrapped surface {id} is not loaded");
            return Ok(());
        };
        self.emit_grid(ctx, &grid, &|v| WrappedSurface::place(&turtle.frame, scale, v))
    }

    /// Draws the interpolation of two wrapped surfaces without caching it.
    fn blended_wrapped_surface(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        ids: (usize, usize),
        blend: f64,
        scale: f64,
    ) -> Result<(), RenderError> {
        let (Some(first), Some(second)) = (ctx.wrapped.get(ids.0), ctx.wrapped.get(ids.1)) else {
            log::warn!("wrapped surfaces {} / {} are not loaded", ids.0, ids.1);
            return Ok(());
        };
        let blended = match first.interpolate(second, blend) {
            Ok(surface) => surface,
            Err(err) => {
                log::warn!("wrapped surface blend skipped: {err}");
                return Ok(());
            }
        };
        let (u_div, v_div) = blended.resolution;
        let grid = blended.grid(u_div, v_div);
        self.emit_grid(ctx, &grid, &|v| WrappedSurface::place(&turtle.frame, scale, v))
    }

    fn mesh(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        id: usize,
        scale: f64,
    ) -> Result<(), RenderError> {
        let Some(mesh) = ctx.meshes.get(id) else {
            log::warn!("mesh {id} is not loaded");
            return Ok(());
        };
        let triangles: Vec<[Vertex; 3]> = mesh
            .triangles()
            .map(|tri| tri.map(|v| WrappedSurface::place(&turtle.frame, scale, v)))
            .collect();
        self.emit_triangles(ctx, &triangles)
    }
}

/// Runs `commands` through `drawer` as one complete pass.
pub fn run_pass(
    ctx: &RenderContext,
    commands: &[TurtleCommand],
    drawer: &mut dyn TurtleDrawer,
) -> Result<(), RenderError> {
    *drawer.pass() = PassState::new();
    let mut interpreter = Interpreter::new();
    drawer.begin(ctx)?;
    drawer.set_appearance(ctx, interpreter.turtle().appearance)?;
    for command in commands {
        interpreter.execute(ctx, drawer, command)?;
    }
    interpreter.finish(ctx, drawer)?;
    drawer.finish(ctx)
}
