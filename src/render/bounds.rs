//! Bounding-volume pass.
//!
//! Emits nothing; every primitive adapts a running min/max box instead.
//! Round shapes contribute their centre ± radius rather than their
//! tessellated outline so the volume also contains the exact quadrics the
//! scene writer emits.

use super::drawer::{PassState, TurtleDrawer, run_pass};
use super::turtle::{Turtle, TurtleCommand};
use super::{Appearance, LineStyle, RenderContext, RenderError};
use crate::geom::{BBox, Point3, Vec3, Vertex};

#[derive(Debug, Default)]
pub struct BoundsAccumulator {
    pass: PassState,
    bounds: Option<BBox>,
}

impl BoundsAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated volume; `None` when nothing was drawn.
    #[must_use]
    pub fn bounds(&self) -> Option<BBox> {
        self.bounds
    }

    pub fn adapt(&mut self, p: Point3) {
        if !p.is_finite() {
            log::warn!("non-finite point ignored by the bounding volume");
            return;
        }
        self.bounds = Some(match self.bounds {
            Some(b) => b.expand_point(p),
            None => BBox::from_point(p),
        });
    }

    /// Adapts to the axis-aligned box around a sphere.
    pub fn adapt_ball(&mut self, centre: Point3, radius: f64) {
        let r = Vec3::new(radius.abs(), radius.abs(), radius.abs());
        self.adapt(centre - r);
        self.adapt(centre + r);
    }

    fn adapt_vertices<'a>(&mut self, vertices: impl IntoIterator<Item = &'a Vertex>) {
        for v in vertices {
            self.adapt(v.position);
        }
    }
}

impl TurtleDrawer for BoundsAccumulator {
    fn pass(&mut self) -> &mut PassState {
        &mut self.pass
    }

    fn begin(&mut self, _ctx: &RenderContext) -> Result<(), RenderError> {
        self.bounds = None;
        Ok(())
    }

    fn set_appearance(
        &mut self,
        _ctx: &RenderContext,
        _appearance: Appearance,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn emit_strip(
        &mut self,
        _ctx: &RenderContext,
        begin: &[Vertex],
        end: &[Vertex],
    ) -> Result<(), RenderError> {
        self.adapt_vertices(begin.iter().chain(end));
        Ok(())
    }

    fn emit_triangles(
        &mut self,
        _ctx: &RenderContext,
        triangles: &[[Vertex; 3]],
    ) -> Result<(), RenderError> {
        self.adapt_vertices(triangles.iter().flatten());
        Ok(())
    }

    fn emit_polygon(
        &mut self,
        _ctx: &RenderContext,
        outline: &[Vertex],
    ) -> Result<(), RenderError> {
        self.adapt_vertices(outline);
        Ok(())
    }

    fn emit_line(
        &mut self,
        _ctx: &RenderContext,
        from: Point3,
        to: Point3,
        width: f64,
    ) -> Result<(), RenderError> {
        self.adapt_ball(from, width * 0.5);
        self.adapt_ball(to, width * 0.5);
        Ok(())
    }

    fn emit_concave_polygon(
        &mut self,
        _ctx: &RenderContext,
        outline: &[Vertex],
    ) -> Result<(), RenderError> {
        // Any triangulation stays inside the outline's box.
        self.adapt_vertices(outline);
        Ok(())
    }

    fn segment(
        &mut self,
        ctx: &RenderContext,
        turtle: &Turtle,
        length: f64,
    ) -> Result<(), RenderError> {
        let frame = &turtle.frame;
        let end = frame.position + frame.heading * length;
        // Lines are traced as thin cylinders, so every style gets its radius.
        let radius = match ctx.options.line_style {
            LineStyle::Pixel => frame.scale.p.abs(),
            LineStyle::Polygon | LineStyle::Cylinder => frame.scale.max_radius(),
        };
        self.adapt_ball(frame.position, radius);
        self.adapt_ball(end, radius);
        Ok(())
    }

    fn circle(
        &mut self,
        _ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        self.adapt_ball(turtle.frame.position, diameter * 0.5);
        Ok(())
    }

    fn sphere(
        &mut self,
        _ctx: &RenderContext,
        turtle: &Turtle,
        diameter: f64,
    ) -> Result<(), RenderError> {
        self.adapt_ball(turtle.frame.position, diameter * 0.5);
        Ok(())
    }
}

/// Runs a bounding pass over `commands`.
pub fn scene_bounds(
    ctx: &RenderContext,
    commands: &[TurtleCommand],
) -> Result<Option<BBox>, RenderError> {
    let mut accumulator = BoundsAccumulator::new();
    run_pass(ctx, commands, &mut accumulator)?;
    Ok(accumulator.bounds())
}
