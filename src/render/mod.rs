//! Turtle command rendering.
//!
//! A pass runs one command list against one [`TurtleDrawer`]. Everything the
//! commands refer to by id (contours, surfaces, meshes, materials, textures)
//! lives in a [`RenderContext`] that stays read-only for the duration of the
//! pass.

pub mod bounds;
pub mod config;
mod drawer;
pub mod immediate;
pub mod obj;
pub mod postscript;
pub mod rayshade;
pub mod turtle;
pub mod view;

use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geom::{
    ContourGallery, GridCache, GridCacheStats, MeshGallery, SurfaceGallery, SurfaceGrid,
    WrappedGallery,
};

pub use config::{
    LineStyle, Material, MaterialTable, RenderConfig, RenderMode, RenderOptions, Rgb,
    TextureEntry, TextureTable,
};
pub use drawer::{PassState, TurtleDrawer, run_pass};
pub use turtle::{Interpreter, Turtle, TurtleCommand};
pub use view::{Light, ViewParameters};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("output stream failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to open output `{path}`: {source}")]
    OpenOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Material index plus optional texture id; writers key their material
/// records on the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Appearance {
    pub color: usize,
    pub texture: Option<usize>,
}

/// Material name for an appearance: solid colours first, then one block of
/// `materials.len()` names per texture.
#[must_use]
pub fn material_name(ctx: &RenderContext, appearance: Appearance) -> String {
    let color = ctx.materials.resolve(appearance.color);
    let number = match appearance.texture.and_then(|t| ctx.textures.ordinal(t)) {
        Some(ordinal) => ctx.materials.len() * (ordinal + 1) + color,
        None => color,
    };
    format!("mat_{number:04}")
}

/// Galleries, tables and options shared by every pass.
#[derive(Debug, Default)]
pub struct RenderContext {
    pub contours: ContourGallery,
    pub surfaces: SurfaceGallery,
    pub wrapped: WrappedGallery,
    pub meshes: MeshGallery,
    pub materials: MaterialTable,
    pub textures: TextureTable,
    pub options: RenderOptions,
    pub view: ViewParameters,
    grid_cache: RefCell<GridCache>,
}

impl RenderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces options, tables and (when present) the view with `config`.
    pub fn apply_config(&mut self, config: RenderConfig) {
        self.options = config.options;
        self.materials = config.materials;
        self.textures = config.textures;
        if let Some(view) = config.view {
            self.view = view;
        }
        // Surface divisions may have changed.
        self.grid_cache.borrow_mut().clear();
    }

    /// Cached grids of every patch of surface `id`.
    #[must_use]
    pub fn surface_grids(&self, id: usize) -> Option<Vec<Arc<SurfaceGrid>>> {
        self.surfaces
            .grids(id, self.options.surface_divisions, &mut self.grid_cache.borrow_mut())
    }

    /// Cached grid of wrapped surface `id` at its current revision.
    #[must_use]
    pub fn wrapped_grid(&self, id: usize) -> Option<Arc<SurfaceGrid>> {
        self.wrapped.grid(id, &mut self.grid_cache.borrow_mut())
    }

    #[must_use]
    pub fn grid_cache_stats(&self) -> GridCacheStats {
        self.grid_cache.borrow().stats()
    }

    /// Drops cached grids of patch surface `id`, e.g. after reloading it.
    pub fn invalidate_surface(&self, id: usize) {
        self.grid_cache.borrow_mut().invalidate_patch_surface(id);
    }
}

/// Output targets a front end can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Obj,
    Rayshade,
    PostScript,
    Bounds,
    Display,
}

impl OutputFormat {
    pub const ALL: &'static [Self] =
        &[Self::Obj, Self::Rayshade, Self::PostScript, Self::Bounds, Self::Display];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Rayshade => "ray",
            Self::PostScript => "ps",
            Self::Bounds => "bbox",
            Self::Display => "display",
        }
    }

    /// File extension of the primary output, if the format writes a file.
    #[must_use]
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Obj => Some("obj"),
            Self::Rayshade => Some("ray"),
            Self::PostScript => Some("eps"),
            Self::Bounds | Self::Display => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown output format `{0}`")]
pub struct UnknownFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "obj" | "wavefront" => Ok(Self::Obj),
            "ray" | "rayshade" => Ok(Self::Rayshade),
            "ps" | "eps" | "postscript" => Ok(Self::PostScript),
            "bbox" | "bounds" => Ok(Self::Bounds),
            "display" | "gl" => Ok(Self::Display),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_formats_round_trip_their_names() {
        for format in OutputFormat::ALL {
            assert_eq!(format.name().parse::<OutputFormat>().unwrap(), *format);
        }
        assert!("vrml".parse::<OutputFormat>().is_err());
    }
}
