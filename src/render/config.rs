//! Render options, materials and textures.
//!
//! Everything here is read-only during a pass. The XML settings document is
//! parsed by [`crate::parse::config_xml`]; the types also deserialize from JSON
//! (through `serde-wasm-bindgen`) for the web viewer.

use serde::{Deserialize, Serialize};

use crate::geom::{DEFAULT_DIVISIONS, GcSettings, MAX_DIVISIONS, MIN_DIVISIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    #[default]
    Pixel,
    Polygon,
    Cylinder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Filled,
    Wireframe,
    Shaded,
    FlatShaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub line_style: LineStyle,
    pub render_mode: RenderMode,
    /// Division count for contours without a specified count.
    pub contour_divisions: usize,
    pub capped_cylinders: bool,
    pub concave_polygons: bool,
    /// Free polygons get their Newell normal instead of the turtle up vector.
    pub auto_normals: bool,
    /// Depth-sort vector output.
    pub z_buffer: bool,
    pub tapered_cylinders: bool,
    /// Overrides every patch surface's own (s, t) divisions.
    pub surface_divisions: Option<usize>,
    /// Slices used when spheres, discs and cylinders are tessellated.
    pub quadric_slices: usize,
    /// Wrap Rayshade geometry in a `grid` of this many voxels per axis.
    pub rayshade_grid: Option<usize>,
    /// Emit the scene bounding volume as a Rayshade `box`.
    pub rayshade_bounds_box: bool,
    /// PostScript stroke width for outlines, in points.
    pub outline_width: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            line_style: LineStyle::default(),
            render_mode: RenderMode::default(),
            contour_divisions: DEFAULT_DIVISIONS,
            capped_cylinders: false,
            concave_polygons: false,
            auto_normals: false,
            z_buffer: true,
            tapered_cylinders: false,
            surface_divisions: None,
            quadric_slices: 12,
            rayshade_grid: None,
            rayshade_bounds_box: false,
            outline_width: 0.25,
        }
    }
}

impl RenderOptions {
    #[must_use]
    pub fn gc_settings(&self) -> GcSettings {
        GcSettings {
            default_divisions: self.contour_divisions.clamp(MIN_DIVISIONS, MAX_DIVISIONS),
            tapered: self.tapered_cylinders,
            capped: self.capped_cylinders,
            concave_caps: self.concave_polygons,
        }
    }

    #[must_use]
    pub fn slices(&self) -> usize {
        self.quadric_slices.max(3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn scaled(self, s: f64) -> Self {
        Self::new(self.r * s, self.g * s, self.b * s)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub ambient: Rgb,
    pub diffuse: Rgb,
    pub specular: Rgb,
    pub emissive: Rgb,
    pub shininess: f64,
    pub transparency: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self::from_color(Rgb::WHITE)
    }
}

impl Material {
    #[must_use]
    pub fn from_color(color: Rgb) -> Self {
        Self {
            ambient: color.scaled(0.2),
            diffuse: color,
            specular: Rgb::BLACK,
            emissive: Rgb::BLACK,
            shininess: 0.0,
            transparency: 0.0,
        }
    }
}

/// Colour map: material index -> material. Indices past the end wrap around.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialTable {
    materials: Vec<Material>,
}

const PALETTE: [Rgb; 8] = [
    Rgb::new(1.0, 1.0, 1.0),
    Rgb::new(0.55, 0.35, 0.15),
    Rgb::new(0.1, 0.6, 0.1),
    Rgb::new(0.9, 0.8, 0.1),
    Rgb::new(0.8, 0.1, 0.1),
    Rgb::new(0.9, 0.5, 0.7),
    Rgb::new(0.2, 0.3, 0.9),
    Rgb::new(0.5, 0.5, 0.5),
];

impl Default for MaterialTable {
    fn default() -> Self {
        Self { materials: PALETTE.iter().copied().map(Material::from_color).collect() }
    }
}

impl MaterialTable {
    #[must_use]
    pub fn new(materials: Vec<Material>) -> Self {
        if materials.is_empty() { Self::default() } else { Self { materials } }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> &Material {
        &self.materials[index % self.materials.len()]
    }

    /// Canonical index for `index` (the slot [`MaterialTable::get`] reads).
    #[must_use]
    pub fn resolve(&self, index: usize) -> usize {
        index % self.materials.len()
    }

    pub fn set(&mut self, index: usize, material: Material) {
        if index >= self.materials.len() {
            let fill = self.materials.len();
            self.materials
                .extend((fill..=index).map(|i| Material::from_color(PALETTE[i % PALETTE.len()])));
        }
        self.materials[index] = material;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureEntry {
    pub id: usize,
    /// Image file name as referenced by the output formats.
    pub file: String,
}

/// Opaque texture id -> image file lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureTable {
    textures: Vec<TextureEntry>,
}

impl TextureTable {
    #[must_use]
    pub fn new(textures: Vec<TextureEntry>) -> Self {
        Self { textures }
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&TextureEntry> {
        self.textures.iter().find(|t| t.id == id)
    }

    /// Position of texture `id` in the table, used to number textured materials.
    #[must_use]
    pub fn ordinal(&self, id: usize) -> Option<usize> {
        self.textures.iter().position(|t| t.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn insert(&mut self, entry: TextureEntry) {
        match self.textures.iter_mut().find(|t| t.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.textures.push(entry),
        }
    }
}

/// Everything a settings document provides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderConfig {
    pub options: RenderOptions,
    pub materials: MaterialTable,
    pub textures: TextureTable,
    pub view: Option<super::view::ViewParameters>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_indices_wrap() {
        let table = MaterialTable::default();
        assert_eq!(table.get(0), table.get(table.len()));
        assert_eq!(table.resolve(table.len() + 2), 2);
    }

    #[test]
    fn set_extends_the_table() {
        let mut table = MaterialTable::default();
        let red = Material::from_color(Rgb::new(1.0, 0.0, 0.0));
        table.set(20, red);
        assert_eq!(table.len(), 21);
        assert_eq!(*table.get(20), red);
    }

    #[test]
    fn gc_settings_clamp_divisions() {
        let options = RenderOptions { contour_divisions: 1000, ..RenderOptions::default() };
        assert_eq!(options.gc_settings().default_divisions, MAX_DIVISIONS);
    }

    #[test]
    fn texture_ordinals_follow_insertion() {
        let mut table = TextureTable::default();
        table.insert(TextureEntry { id: 7, file: "bark.rgb".into() });
        table.insert(TextureEntry { id: 3, file: "leaf.rgb".into() });
        assert_eq!(table.ordinal(3), Some(1));
        assert_eq!(table.get(7).map(|t| t.file.as_str()), Some("bark.rgb"));
        assert_eq!(table.ordinal(9), None);
    }
}
