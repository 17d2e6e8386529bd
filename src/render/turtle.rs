//! Turtle state and the command interpreter.
//!
//! The interpreter owns the turtle and its branch stack and forwards every
//! drawing command to a [`TurtleDrawer`]. Movement commands only touch the
//! turtle; a forward move while a generalized cylinder is open extends the
//! cylinder instead of drawing a segment.

use serde::{Deserialize, Serialize};

use super::drawer::TurtleDrawer;
use super::{Appearance, RenderContext, RenderError, RenderOptions};
use crate::geom::{
    GcSection, GcSettings, MAX_DIVISIONS, MIN_DIVISIONS, OrientationFrame, Vec3, WidthScale,
};

/// One turtle command. Angles are in degrees, ids index the context galleries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TurtleCommand {
    /// Move forward drawing a segment (`F`).
    Forward { distance: f64 },
    /// Move forward without drawing (`f`).
    Move { distance: f64 },
    Turn { angle: f64 },
    Pitch { angle: f64 },
    Roll { angle: f64 },
    TurnAround,
    RollToHorizontal,
    /// Points the heading at a world direction.
    SetHeading { direction: [f64; 3] },
    Push,
    Pop,
    SetWidth { width: f64 },
    /// Non-uniform cross-section radii along left (p) and up (q).
    SetScale { p: f64, q: f64 },
    SetColor { index: usize },
    SetTexture { id: Option<usize> },
    SetContour { id: usize },
    /// Cross-section as the blend of two contours; 0 is `first`, 1 is `second`.
    BlendContours { first: usize, second: usize, blend: f64 },
    /// Overrides contour divisions; `None` restores the contour's own count.
    SetDivisions { divisions: Option<usize> },
    /// Overrides the normal of following cylinder cross-sections.
    SetGcNormal { normal: Option<[f64; 3]> },
    SetTapering { enabled: Option<bool> },
    StartGc,
    PointGc,
    EndGc,
    StartPolygon,
    PolygonPoint,
    EndPolygon,
    Circle { diameter: f64 },
    Sphere { diameter: f64 },
    Rhombus { length: f64, width: f64 },
    Triangle { length: f64, width: f64 },
    Surface { id: usize, scale: f64 },
    WrappedSurface { id: usize, scale: f64 },
    BlendedWrappedSurface { first: usize, second: usize, blend: f64, scale: f64 },
    Mesh { id: usize, scale: f64 },
    Label { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turtle {
    pub frame: OrientationFrame,
    pub appearance: Appearance,
    pub contour: usize,
    pub contour2: usize,
    pub blend: f64,
    pub divisions: Option<usize>,
    pub gc_normal: Option<Vec3>,
    pub tapered: Option<bool>,
}

impl Default for Turtle {
    fn default() -> Self {
        Self {
            frame: OrientationFrame::default(),
            appearance: Appearance::default(),
            contour: 0,
            contour2: 0,
            blend: 0.0,
            divisions: None,
            gc_normal: None,
            tapered: None,
        }
    }
}

impl Turtle {
    /// Cross-section the cylinder engine captures at the current state.
    #[must_use]
    pub fn gc_section(&self) -> GcSection {
        GcSection {
            frame: self.frame,
            contour: self.contour,
            contour2: self.contour2,
            blend: self.blend,
            normal: self.gc_normal,
            divisions: self.divisions,
        }
    }

    /// Pass options with the turtle's own overrides applied.
    #[must_use]
    pub fn gc_settings(&self, options: &RenderOptions) -> GcSettings {
        let mut settings = options.gc_settings();
        if let Some(tapered) = self.tapered {
            settings.tapered = tapered;
        }
        settings
    }
}

#[derive(Debug, Default)]
pub struct Interpreter {
    turtle: Turtle,
    stack: Vec<Turtle>,
}

impl Interpreter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn turtle(&self) -> &Turtle {
        &self.turtle
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn execute(
        &mut self,
        ctx: &RenderContext,
        drawer: &mut dyn TurtleDrawer,
        command: &TurtleCommand,
    ) -> Result<(), RenderError> {
        let turtle = &mut self.turtle;
        match command {
            TurtleCommand::Forward { distance } => {
                if drawer.pass().polygon.is_some() {
                    turtle.frame.move_forward(*distance);
                    drawer.polygon_point(ctx, turtle)?;
                } else if drawer.pass().cylinder.is_active() {
                    turtle.frame.move_forward(*distance);
                    drawer.point_gc(ctx, turtle)?;
                } else {
                    drawer.segment(ctx, turtle, *distance)?;
                    turtle.frame.move_forward(*distance);
                }
            }
            TurtleCommand::Move { distance } => turtle.frame.move_forward(*distance),
            TurtleCommand::Turn { angle } => turtle.frame.turn(*angle),
            TurtleCommand::Pitch { angle } => turtle.frame.pitch(*angle),
            TurtleCommand::Roll { angle } => turtle.frame.roll(*angle),
            TurtleCommand::TurnAround => turtle.frame.turn_around(),
            TurtleCommand::RollToHorizontal => turtle.frame.roll_to_horizontal(Vec3::Y),
            TurtleCommand::SetHeading { direction } => {
                turtle.frame.set_heading(Vec3::from_array(*direction));
            }
            TurtleCommand::Push => {
                self.stack.push(self.turtle);
                drawer.start_branch();
            }
            TurtleCommand::Pop => self.pop(ctx, drawer)?,
            TurtleCommand::SetWidth { width } => turtle.frame.set_width(*width),
            TurtleCommand::SetScale { p, q } => turtle.frame.scale = WidthScale { p: *p, q: *q },
            TurtleCommand::SetColor { index } => {
                self.set_appearance(ctx, drawer, Appearance { color: *index, ..self.turtle.appearance })?;
            }
            TurtleCommand::SetTexture { id } => {
                if let Some(id) = id.filter(|id| ctx.textures.get(*id).is_none()) {
                    log::warn!("texture {id} is not defined");
                }
                self.set_appearance(ctx, drawer, Appearance { texture: *id, ..self.turtle.appearance })?;
            }
            TurtleCommand::SetContour { id } => {
                if ctx.contours.is_valid(*id) {
                    turtle.contour = *id;
                    turtle.contour2 = *id;
                    turtle.blend = 0.0;
                } else {
                    log::warn!("invalid contour id {id} ignored");
                }
            }
            TurtleCommand::BlendContours { first, second, blend } => {
                if ctx.contours.is_valid(*first) && ctx.contours.is_valid(*second) {
                    turtle.contour = *first;
                    turtle.contour2 = *second;
                    turtle.blend = blend.clamp(0.0, 1.0);
                } else {
                    log::warn!("invalid contour blend {first} / {second} ignored");
                }
            }
            TurtleCommand::SetDivisions { divisions } => match divisions {
                Some(d) if !(MIN_DIVISIONS..=MAX_DIVISIONS).contains(d) => {
                    log::warn!(
                        "division count {d} outside [{MIN_DIVISIONS}, {MAX_DIVISIONS}] ignored"
                    );
                }
                _ => turtle.divisions = *divisions,
            },
            TurtleCommand::SetGcNormal { normal } => {
                turtle.gc_normal = normal.and_then(|n| Vec3::from_array(n).normalized());
            }
            TurtleCommand::SetTapering { enabled } => turtle.tapered = *enabled,
            TurtleCommand::StartGc => drawer.start_gc(ctx, turtle)?,
            TurtleCommand::PointGc => drawer.point_gc(ctx, turtle)?,
            TurtleCommand::EndGc => drawer.end_gc(ctx, turtle)?,
            TurtleCommand::StartPolygon => drawer.start_polygon(ctx, turtle)?,
            TurtleCommand::PolygonPoint => drawer.polygon_point(ctx, turtle)?,
            TurtleCommand::EndPolygon => drawer.end_polygon(ctx, turtle)?,
            TurtleCommand::Circle { diameter } => drawer.circle(ctx, turtle, *diameter)?,
            TurtleCommand::Sphere { diameter } => drawer.sphere(ctx, turtle, *diameter)?,
            TurtleCommand::Rhombus { length, width } => {
                drawer.rhombus(ctx, turtle, *length, *width)?;
            }
            TurtleCommand::Triangle { length, width } => {
                drawer.triangle(ctx, turtle, *length, *width)?;
            }
            TurtleCommand::Surface { id, scale } => drawer.surface(ctx, turtle, *id, *scale)?,
            TurtleCommand::WrappedSurface { id, scale } => {
                drawer.wrapped_surface(ctx, turtle, *id, *scale)?;
            }
            TurtleCommand::BlendedWrappedSurface { first, second, blend, scale } => {
                drawer.blended_wrapped_surface(ctx, turtle, (*first, *second), *blend, *scale)?;
            }
            TurtleCommand::Mesh { id, scale } => drawer.mesh(ctx, turtle, *id, *scale)?,
            TurtleCommand::Label { text } => drawer.label(ctx, turtle, text)?,
        }
        self.turtle.frame.orthonormalize();
        Ok(())
    }

    fn pop(
        &mut self,
        ctx: &RenderContext,
        drawer: &mut dyn TurtleDrawer,
    ) -> Result<(), RenderError> {
        let Some(saved) = self.stack.pop() else {
            log::warn!("Pop ignored: branch stack is empty");
            return Ok(());
        };
        drawer.end_branch();
        let previous = self.turtle.appearance;
        self.turtle = saved;
        if previous != saved.appearance {
            drawer.set_appearance(ctx, saved.appearance)?;
        }
        Ok(())
    }

    fn set_appearance(
        &mut self,
        ctx: &RenderContext,
        drawer: &mut dyn TurtleDrawer,
        appearance: Appearance,
    ) -> Result<(), RenderError> {
        if appearance != self.turtle.appearance {
            self.turtle.appearance = appearance;
            drawer.set_appearance(ctx, appearance)?;
        }
        Ok(())
    }

    /// Closes whatever the command list left open.
    pub fn finish(
        &mut self,
        ctx: &RenderContext,
        drawer: &mut dyn TurtleDrawer,
    ) -> Result<(), RenderError> {
        if drawer.pass().cylinder.is_active() {
            log::warn!("generalized cylinder left open at end of pass, closing it");
            drawer.end_gc(ctx, &self.turtle)?;
        }
        if let Some(outline) = drawer.pass().polygon.take() {
            log::warn!("polygon with {} points left open at end of pass, dropped", outline.len());
        }
        if !self.stack.is_empty() {
            log::warn!("{} branches left open at end of pass", self.stack.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::immediate::{DisplayList, ImmediateRenderer, Primitive};
    use crate::render::run_pass;

    fn interpret(commands: &[TurtleCommand]) -> Interpreter {
        let ctx = RenderContext::new();
        let mut drawer = ImmediateRenderer::new(DisplayList::new());
        let mut interpreter = Interpreter::new();
        for command in commands {
            interpreter.execute(&ctx, &mut drawer, command).unwrap();
        }
        interpreter
    }

    fn display_list(commands: &[TurtleCommand]) -> DisplayList {
        let ctx = RenderContext::new();
        let mut drawer = ImmediateRenderer::new(DisplayList::new());
        run_pass(&ctx, commands, &mut drawer).unwrap();
        drawer.into_inner()
    }

    #[test]
    fn pop_restores_the_pushed_turtle() {
        use TurtleCommand as C;
        let interpreter = interpret(&[
            C::SetColor { index: 2 },
            C::Push,
            C::Turn { angle: 90.0 },
            C::Move { distance: 3.0 },
            C::SetColor { index: 5 },
            C::Pop,
        ]);
        let turtle = interpreter.turtle();
        assert_eq!(interpreter.depth(), 0);
        assert_eq!(turtle.appearance.color, 2);
        assert!(turtle.frame.position.distance_to(crate::geom::Point3::ORIGIN) < 1e-12);
        assert!((turtle.frame.heading - Vec3::Y).length() < 1e-12);
    }

    #[test]
    fn unbalanced_pop_is_ignored() {
        let interpreter = interpret(&[TurtleCommand::Pop, TurtleCommand::Move { distance: 1.0 }]);
        assert_eq!(interpreter.depth(), 0);
        assert!((interpreter.turtle().frame.position.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_settings_leave_the_turtle_unchanged() {
        use TurtleCommand as C;
        let interpreter = interpret(&[
            C::SetContour { id: 4 },
            C::SetDivisions { divisions: Some(100) },
            C::BlendContours { first: 0, second: 9, blend: 0.5 },
        ]);
        assert_eq!(*interpreter.turtle(), Turtle::default());

        let interpreter = interpret(&[C::BlendContours { first: 0, second: 0, blend: 2.0 }]);
        assert_eq!(interpreter.turtle().blend, 1.0);
    }

    #[test]
    fn tapering_override_wins_over_options() {
        let interpreter = interpret(&[TurtleCommand::SetTapering { enabled: Some(true) }]);
        let options = RenderOptions::default();
        assert!(!options.gc_settings().tapered);
        assert!(interpreter.turtle().gc_settings(&options).tapered);
    }

    #[test]
    fn second_start_gc_is_ignored() {
        use TurtleCommand as C;
        let list = display_list(&[
            C::StartGc,
            C::Forward { distance: 1.0 },
            C::StartGc,
            C::Forward { distance: 1.0 },
            C::EndGc,
        ]);
        assert_eq!(list.count(Primitive::QuadStrip), 2);
    }

    #[test]
    fn open_cylinder_is_closed_at_the_end_of_the_pass() {
        let list = display_list(&[TurtleCommand::StartGc, TurtleCommand::Move { distance: 2.0 }]);
        assert_eq!(list.count(Primitive::QuadStrip), 1);
    }

    #[test]
    fn closed_branch_does_not_split_the_tube() {
        use TurtleCommand as C;
        let mut ctx = RenderContext::new();
        ctx.options.capped_cylinders = true;
        let mut drawer = ImmediateRenderer::new(DisplayList::new());
        let commands = [
            C::StartGc,
            C::Forward { distance: 1.0 },
            C::Push,
            C::Pop,
            C::Forward { distance: 1.0 },
            C::StartGc,
            C::Forward { distance: 1.0 },
            C::EndGc,
        ];
        run_pass(&ctx, &commands, &mut drawer).unwrap();
        let list = drawer.into_inner();
        // One tube: a cap at each end only.
        assert_eq!(list.count(Primitive::Triangles), 2);
        assert_eq!(list.count(Primitive::QuadStrip), 3);
    }

    #[test]
    fn start_gc_inside_an_open_branch_starts_a_new_tube() {
        use TurtleCommand as C;
        let mut ctx = RenderContext::new();
        ctx.options.capped_cylinders = true;
        let mut drawer = ImmediateRenderer::new(DisplayList::new());
        let commands = [
            C::StartGc,
            C::Forward { distance: 1.0 },
            C::Push,
            C::Push,
            C::Pop,
            C::StartGc,
            C::Forward { distance: 1.0 },
            C::EndGc,
            C::Pop,
        ];
        run_pass(&ctx, &commands, &mut drawer).unwrap();
        assert_eq!(drawer.into_inner().count(Primitive::Triangles), 4);
    }

    #[test]
    fn forward_inside_a_polygon_records_points() {
        use TurtleCommand as C;
        let list = display_list(&[
            C::StartPolygon,
            C::PolygonPoint,
            C::Forward { distance: 1.0 },
            C::Turn { angle: 90.0 },
            C::Forward { distance: 1.0 },
            C::EndPolygon,
        ]);
        assert_eq!(list.count(Primitive::Polygon), 1);
        assert_eq!(list.count(Primitive::Lines), 0);
        assert_eq!(list.vertex_count(), 3);
    }
}
