//! Plain-Rust front end: a render context plus one command list.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::geom::{BBox, ContourError, MeshError, SurfaceError, WrappedSurfaceError};
use crate::parse::config_xml::{ConfigError, parse_config};
use crate::parse::script::{ScriptError, parse_script};
use crate::render::bounds::scene_bounds;
use crate::render::immediate::{DisplayList, ImmediateRenderer};
use crate::render::obj::ObjWriter;
use crate::render::postscript::PostScriptWriter;
use crate::render::rayshade::RayshadeWriter;
use crate::render::{OutputFormat, RenderContext, RenderError, TurtleCommand, run_pass};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Contour(#[from] ContourError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    WrappedSurface(#[from] WrappedSurfaceError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("format `{0}` does not write a file")]
    NoFileOutput(OutputFormat),
}

/// Text produced by one render call; `materials` is only set for OBJ.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RenderedText {
    pub main: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<String>,
}

#[derive(Debug, Default)]
pub struct Session {
    ctx: RenderContext,
    commands: Vec<TurtleCommand>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    #[must_use]
    pub fn commands(&self) -> &[TurtleCommand] {
        &self.commands
    }

    pub fn set_commands(&mut self, commands: Vec<TurtleCommand>) {
        self.commands = commands;
    }

    /// Replaces the command list with the parsed script.
    pub fn load_script(&mut self, text: &str) -> Result<usize, SessionError> {
        self.commands = parse_script(text)?;
        Ok(self.commands.len())
    }

    pub fn load_contours(&mut self, text: &str) -> Result<usize, SessionError> {
        Ok(self.ctx.contours.load(text)?)
    }

    /// Loads a patch surface; returns its id.
    pub fn load_surface(&mut self, text: &str) -> Result<usize, SessionError> {
        Ok(self.ctx.surfaces.load(text)?)
    }

    /// Loads a wrapped surface; returns its id.
    pub fn load_wrapped_surface(&mut self, text: &str) -> Result<usize, SessionError> {
        Ok(self.ctx.wrapped.load(text)?)
    }

    /// Loads an OBJ mesh; returns its id.
    pub fn load_mesh(&mut self, name: &str, text: &str) -> Result<usize, SessionError> {
        Ok(self.ctx.meshes.load(name, text)?)
    }

    pub fn load_config(&mut self, xml: &str) -> Result<(), SessionError> {
        self.ctx.apply_config(parse_config(xml)?);
        Ok(())
    }

    pub fn bounding_box(&self) -> Result<Option<BBox>, RenderError> {
        scene_bounds(&self.ctx, &self.commands)
    }

    /// Writes geometry to `obj` and materials to `mtl`; `mtl_file` is the name `obj` refers to.
    pub fn render_obj<W: Write, M: Write>(
        &self,
        obj: W,
        mtl: M,
        mtl_file: &str,
    ) -> Result<(W, M), RenderError> {
        let bounds = self.bounding_box()?;
        let mut writer = ObjWriter::new(obj, mtl, mtl_file, bounds);
        run_pass(&self.ctx, &self.commands, &mut writer)?;
        Ok(writer.into_inner())
    }

    pub fn render_rayshade<W: Write>(&self, out: W) -> Result<W, RenderError> {
        let bounds = self.bounding_box()?;
        let mut writer = RayshadeWriter::new(out, bounds);
        run_pass(&self.ctx, &self.commands, &mut writer)?;
        Ok(writer.into_inner())
    }

    pub fn render_postscript<W: Write>(&self, out: W) -> Result<W, RenderError> {
        let bounds = self.bounding_box()?;
        let mut writer = PostScriptWriter::new(out, bounds);
        run_pass(&self.ctx, &self.commands, &mut writer)?;
        Ok(writer.into_inner())
    }

    pub fn display_list(&self) -> Result<DisplayList, RenderError> {
        let mut renderer = ImmediateRenderer::new(DisplayList::new());
        run_pass(&self.ctx, &self.commands, &mut renderer)?;
        Ok(renderer.into_inner())
    }

    /// Renders a file format into memory.
    pub fn render_text(&self, format: OutputFormat) -> Result<RenderedText, SessionError> {
        let text = |bytes: Vec<u8>| String::from_utf8_lossy(&bytes).into_owned();
        Ok(match format {
            OutputFormat::Obj => {
                let (obj, mtl) = self.render_obj(Vec::new(), Vec::new(), "scene.mtl")?;
                RenderedText { main: text(obj), materials: Some(text(mtl)) }
            }
            OutputFormat::Rayshade => {
                RenderedText { main: text(self.render_rayshade(Vec::new())?), materials: None }
            }
            OutputFormat::PostScript => {
                RenderedText { main: text(self.render_postscript(Vec::new())?), materials: None }
            }
            OutputFormat::Bounds => {
                RenderedText { main: bounds_text(self.bounding_box()?), materials: None }
            }
            OutputFormat::Display => return Err(SessionError::NoFileOutput(format)),
        })
    }

    /// Renders `format` into `path`. OBJ output also writes the `.mtl` next to it.
    pub fn render_to_path(&self, format: OutputFormat, path: &Path) -> Result<(), SessionError> {
        let open = |path: &Path| {
            File::create(path).map(BufWriter::new).map_err(|source| RenderError::OpenOutput {
                path: path.display().to_string(),
                source,
            })
        };
        // The writers flush their streams when the pass finishes.
        match format {
            OutputFormat::Obj => {
                let mtl_path = path.with_extension("mtl");
                let mtl_file = mtl_path.file_name().map_or_else(
                    || "scene.mtl".to_owned(),
                    |name| name.to_string_lossy().into_owned(),
                );
                self.render_obj(open(path)?, open(&mtl_path)?, &mtl_file)?;
            }
            OutputFormat::Rayshade => {
                self.render_rayshade(open(path)?)?;
            }
            OutputFormat::PostScript => {
                self.render_postscript(open(path)?)?;
            }
            OutputFormat::Bounds => {
                let mut out = open(path)?;
                out.write_all(bounds_text(self.bounding_box()?).as_bytes())
                    .and_then(|()| out.flush())
                    .map_err(RenderError::from)?;
            }
            OutputFormat::Display => return Err(SessionError::NoFileOutput(format)),
        }
        log::debug!("wrote {format} output to {}", path.display());
        Ok(())
    }
}

/// `min x y z` / `max x y z` lines, or `empty` when nothing was drawn.
#[must_use]
pub fn bounds_text(bounds: Option<BBox>) -> String {
    match bounds {
        Some(b) => format!(
            "min {} {} {}\nmax {} {} {}\n",
            b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
        ),
        None => "empty\n".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::immediate::DrawCall;

    #[test]
    fn script_drives_every_text_format() {
        let mut session = Session::new();
        session.load_script("F 2\n[\n+ 45\nF\n]\n@O 0.5\n").unwrap();
        let obj = session.render_text(OutputFormat::Obj).unwrap();
        assert!(obj.main.contains("mtllib scene.mtl"));
        assert!(obj.materials.unwrap().contains("newmtl mat_0000"));
        assert!(session.render_text(OutputFormat::Rayshade).unwrap().main.contains("object plant"));
        assert!(session.render_text(OutputFormat::PostScript).unwrap().main.ends_with("%%EOF\n"));
        assert!(session.render_text(OutputFormat::Bounds).unwrap().main.starts_with("min "));
        assert!(matches!(
            session.render_text(OutputFormat::Display),
            Err(SessionError::NoFileOutput(OutputFormat::Display))
        ));
    }

    #[test]
    fn empty_scene_has_no_bounds() {
        let session = Session::new();
        assert_eq!(session.bounding_box().unwrap(), None);
        assert_eq!(bounds_text(None), "empty\n");
    }

    #[test]
    fn config_changes_the_line_style() {
        let mut session = Session::new();
        session.load_config(r#"<render><options line_style="cylinder"/></render>"#).unwrap();
        session.set_commands(vec![TurtleCommand::Forward { distance: 1.0 }]);
        let list = session.display_list().unwrap();
        let cylinder = |c: &DrawCall| matches!(c, DrawCall::Cylinder { .. });
        assert!(list.calls.iter().any(cylinder));
    }
}
