//! Render settings documents.
//!
//! ```xml
//! <render>
//!   <options line_style="cylinder" render_mode="shaded" contour_divisions="12"
//!            capped_cylinders="true" z_buffer="true" quadric_slices="16"/>
//!   <material index="2" diffuse="0.1 0.6 0.1" specular="0.2 0.2 0.2" shininess="20"/>
//!   <texture id="1" file="bark.rgb"/>
//!   <view eye="0 5 20" target="0 5 0" up="0 1 0" fov="40" background="0 0 0">
//!     <light direction="0 1 1" color="1 1 1"/>
//!   </view>
//! </render>
//! ```
//!
//! Every attribute is optional; missing ones keep their defaults.

use std::str::FromStr;

use quick_xml::de::from_str;
use serde::Deserialize;
use thiserror::Error;

use crate::render::{
    Light, LineStyle, Material, MaterialTable, RenderConfig, RenderMode, RenderOptions, Rgb,
    TextureEntry, TextureTable, ViewParameters,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("<{element}> attribute `{attribute}`: invalid value `{value}`")]
    Attribute { element: &'static str, attribute: &'static str, value: String },
    #[error("<{element}> is missing required attribute `{attribute}`")]
    Missing { element: &'static str, attribute: &'static str },
}

/// Parses a settings document.
pub fn parse_config(input: &str) -> Result<RenderConfig, ConfigError> {
    log::debug!("parsing render settings");
    let document: RawRender = from_str(input)?;

    let options = match document.options {
        Some(raw) => raw.into_options()?,
        None => RenderOptions::default(),
    };

    let mut materials = MaterialTable::default();
    for raw in document.materials {
        let index = required(raw.index.as_deref(), "material", "index")?;
        materials.set(index, raw.into_material()?);
    }

    let mut textures = TextureTable::default();
    for raw in document.textures {
        let id = required(raw.id.as_deref(), "texture", "id")?;
        let file = raw.file.ok_or(ConfigError::Missing { element: "texture", attribute: "file" })?;
        textures.insert(TextureEntry { id, file });
    }

    let view = document.view.map(RawView::into_view).transpose()?;
    log::debug!(
        "render settings: {} materials, {} textures, view {}",
        materials.len(),
        textures.len(),
        if view.is_some() { "set" } else { "default" }
    );
    Ok(RenderConfig { options, materials, textures, view })
}

fn attribute<T: FromStr>(
    value: Option<&str>,
    element: &'static str,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse().map_err(|_| ConfigError::Attribute {
                element,
                attribute: name,
                value: v.to_owned(),
            })
        })
        .transpose()
}

fn required<T: FromStr>(
    value: Option<&str>,
    element: &'static str,
    name: &'static str,
) -> Result<T, ConfigError> {
    attribute(value, element, name)?.ok_or(ConfigError::Missing { element, attribute: name })
}

fn triple(value: Option<&str>, element: &'static str, name: &'static str) -> Result<Option<[f64; 3]>, ConfigError> {
    let Some(text) = value else {
        return Ok(None);
    };
    let invalid = || ConfigError::Attribute { element, attribute: name, value: text.to_owned() };
    let parts: Vec<f64> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [a, b, c] => Ok(Some([a, b, c])),
        _ => Err(invalid()),
    }
}

fn color(value: Option<&str>, element: &'static str, name: &'static str) -> Result<Option<Rgb>, ConfigError> {
    Ok(triple(value, element, name)?.map(|[r, g, b]| Rgb::new(r, g, b)))
}

fn flag(value: Option<&str>, element: &'static str, name: &'static str) -> Result<Option<bool>, ConfigError> {
    value
        .map(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ConfigError::Attribute { element, attribute: name, value: v.to_owned() }),
        })
        .transpose()
}

// ── raw document ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawRender {
    #[serde(default)]
    options: Option<RawOptions>,
    #[serde(default, rename = "material")]
    materials: Vec<RawMaterial>,
    #[serde(default, rename = "texture")]
    textures: Vec<RawTexture>,
    #[serde(default)]
    view: Option<RawView>,
}

#[derive(Debug, Deserialize)]
struct RawOptions {
    #[serde(rename = "@line_style")]
    line_style: Option<String>,
    #[serde(rename = "@render_mode")]
    render_mode: Option<String>,
    #[serde(rename = "@contour_divisions")]
    contour_divisions: Option<String>,
    #[serde(rename = "@capped_cylinders")]
    capped_cylinders: Option<String>,
    #[serde(rename = "@concave_polygons")]
    concave_polygons: Option<String>,
    #[serde(rename = "@auto_normals")]
    auto_normals: Option<String>,
    #[serde(rename = "@z_buffer")]
    z_buffer: Option<String>,
    #[serde(rename = "@tapered_cylinders")]
    tapered_cylinders: Option<String>,
    #[serde(rename = "@surface_divisions")]
    surface_divisions: Option<String>,
    #[serde(rename = "@quadric_slices")]
    quadric_slices: Option<String>,
    #[serde(rename = "@rayshade_grid")]
    rayshade_grid: Option<String>,
    #[serde(rename = "@rayshade_bounds_box")]
    rayshade_bounds_box: Option<String>,
    #[serde(rename = "@outline_width")]
    outline_width: Option<String>,
}

impl RawOptions {
    fn into_options(self) -> Result<RenderOptions, ConfigError> {
        const E: &str = "options";
        let mut options = RenderOptions::default();
        if let Some(style) = self.line_style.as_deref() {
            options.line_style = match style.trim().to_ascii_lowercase().as_str() {
                "pixel" | "line" => LineStyle::Pixel,
                "polygon" => LineStyle::Polygon,
                "cylinder" => LineStyle::Cylinder,
                _ => return Err(invalid(E, "line_style", style)),
            };
        }
        if let Some(mode) = self.render_mode.as_deref() {
            options.render_mode = match mode.trim().to_ascii_lowercase().as_str() {
                "filled" => RenderMode::Filled,
                "wireframe" => RenderMode::Wireframe,
                "shaded" => RenderMode::Shaded,
                "flat_shaded" | "flat" => RenderMode::FlatShaded,
                _ => return Err(invalid(E, "render_mode", mode)),
            };
        }
        let d = self.contour_divisions.as_deref();
        if let Some(divisions) = attribute(d, E, "contour_divisions")? {
            options.contour_divisions = divisions;
        }
        if let Some(v) = flag(self.capped_cylinders.as_deref(), E, "capped_cylinders")? {
            options.capped_cylinders = v;
        }
        if let Some(v) = flag(self.concave_polygons.as_deref(), E, "concave_polygons")? {
            options.concave_polygons = v;
        }
        if let Some(v) = flag(self.auto_normals.as_deref(), E, "auto_normals")? {
            options.auto_normals = v;
        }
        if let Some(v) = flag(self.z_buffer.as_deref(), E, "z_buffer")? {
            options.z_buffer = v;
        }
        if let Some(v) = flag(self.tapered_cylinders.as_deref(), E, "tapered_cylinders")? {
            options.tapered_cylinders = v;
        }
        let sd = self.surface_divisions.as_deref();
        options.surface_divisions = attribute(sd, E, "surface_divisions")?;
        if let Some(v) = attribute(self.quadric_slices.as_deref(), E, "quadric_slices")? {
            options.quadric_slices = v;
        }
        options.rayshade_grid = attribute(self.rayshade_grid.as_deref(), E, "rayshade_grid")?;
        if let Some(v) = flag(self.rayshade_bounds_box.as_deref(), E, "rayshade_bounds_box")? {
            options.rayshade_bounds_box = v;
        }
        if let Some(v) = attribute(self.outline_width.as_deref(), E, "outline_width")? {
            options.outline_width = v;
        }
        Ok(options)
    }
}

fn invalid(element: &'static str, attribute: &'static str, value: &str) -> ConfigError {
    ConfigError::Attribute { element, attribute, value: value.to_owned() }
}

#[derive(Debug, Deserialize)]
struct RawMaterial {
    #[serde(rename = "@index")]
    index: Option<String>,
    #[serde(rename = "@ambient")]
    ambient: Option<String>,
    #[serde(rename = "@diffuse")]
    diffuse: Option<String>,
    #[serde(rename = "@specular")]
    specular: Option<String>,
    #[serde(rename = "@emissive")]
    emissive: Option<String>,
    #[serde(rename = "@shininess")]
    shininess: Option<String>,
    #[serde(rename = "@transparency")]
    transparency: Option<String>,
}

impl RawMaterial {
    fn into_material(self) -> Result<Material, ConfigError> {
        const E: &str = "material";
        let diffuse = color(self.diffuse.as_deref(), E, "diffuse")?.unwrap_or(Rgb::WHITE);
        let mut material = Material::from_color(diffuse);
        if let Some(c) = color(self.ambient.as_deref(), E, "ambient")? {
            material.ambient = c;
        }
        if let Some(c) = color(self.specular.as_deref(), E, "specular")? {
            material.specular = c;
        }
        if let Some(c) = color(self.emissive.as_deref(), E, "emissive")? {
            material.emissive = c;
        }
        if let Some(v) = attribute(self.shininess.as_deref(), E, "shininess")? {
            material.shininess = v;
        }
        if let Some(v) = attribute::<f64>(self.transparency.as_deref(), E, "transparency")? {
            material.transparency = v.clamp(0.0, 1.0);
        }
        Ok(material)
    }
}

#[derive(Debug, Deserialize)]
struct RawTexture {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@file")]
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawView {
    #[serde(rename = "@eye")]
    eye: Option<String>,
    #[serde(rename = "@target")]
    target: Option<String>,
    #[serde(rename = "@up")]
    up: Option<String>,
    #[serde(rename = "@fov")]
    fov: Option<String>,
    #[serde(rename = "@background")]
    background: Option<String>,
    #[serde(default, rename = "light")]
    lights: Vec<RawLight>,
}

#[derive(Debug, Deserialize)]
struct RawLight {
    #[serde(rename = "@direction")]
    direction: Option<String>,
    #[serde(rename = "@color")]
    color: Option<String>,
}

impl RawView {
    fn into_view(self) -> Result<ViewParameters, ConfigError> {
        const E: &str = "view";
        let mut view = ViewParameters::default();
        if let Some(eye) = triple(self.eye.as_deref(), E, "eye")? {
            view.eye = eye;
        }
        if let Some(target) = triple(self.target.as_deref(), E, "target")? {
            view.target = target;
        }
        if let Some(up) = triple(self.up.as_deref(), E, "up")? {
            view.up = up;
        }
        if let Some(fov) = attribute(self.fov.as_deref(), E, "fov")? {
            view.fov_degrees = fov;
        }
        if let Some(background) = color(self.background.as_deref(), E, "background")? {
            view.background = background;
        }
        if !self.lights.is_empty() {
            view.lights = self
                .lights
                .into_iter()
                .map(|raw| {
                    let direction = triple(raw.direction.as_deref(), "light", "direction")?
                        .ok_or(ConfigError::Missing { element: "light", attribute: "direction" })?;
                    let color = color(raw.color.as_deref(), "light", "color")?.unwrap_or(Rgb::WHITE);
                    Ok(Light { direction, color })
                })
                .collect::<Result<_, ConfigError>>()?;
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"
<render>
  <options line_style="cylinder" render_mode="flat_shaded" contour_divisions="12"
           capped_cylinders="yes" z_buffer="false" rayshade_grid="8"/>
  <material index="2" diffuse="0.1 0.6 0.1" shininess="20" transparency="0.25"/>
  <material index="9" diffuse="1,0,0"/>
  <texture id="4" file="bark.rgb"/>
  <view eye="0 5 20" fov="30">
    <light direction="0 1 1" color="0.5 0.5 0.5"/>
    <light direction="1 0 0"/>
  </view>
</render>
"#;

    #[test]
    fn parses_a_full_document() {
        let config = parse_config(SETTINGS).unwrap();
        assert_eq!(config.options.line_style, LineStyle::Cylinder);
        assert_eq!(config.options.render_mode, RenderMode::FlatShaded);
        assert_eq!(config.options.contour_divisions, 12);
        assert!(config.options.capped_cylinders);
        assert!(!config.options.z_buffer);
        assert_eq!(config.options.rayshade_grid, Some(8));
        assert_eq!(config.materials.get(2).diffuse, Rgb::new(0.1, 0.6, 0.1));
        assert_eq!(config.materials.get(2).transparency, 0.25);
        assert_eq!(config.materials.len(), 10);
        assert_eq!(config.textures.get(4).map(|t| t.file.as_str()), Some("bark.rgb"));
        let view = config.view.unwrap();
        assert_eq!(view.eye, [0.0, 5.0, 20.0]);
        assert_eq!(view.fov_degrees, 30.0);
        assert_eq!(view.lights.len(), 2);
        assert_eq!(view.lights[1].color, Rgb::WHITE);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("<render/>").unwrap();
        assert_eq!(config.options, RenderOptions::default());
        assert!(config.view.is_none());
    }

    #[test]
    fn bad_attribute_names_the_element() {
        let err = parse_config(r#"<render><options line_style="zigzag"/></render>"#).unwrap_err();
        assert_eq!(err.to_string(), "<options> attribute `line_style`: invalid value `zigzag`");
        let err = parse_config(r#"<render><texture id="1"/></render>"#).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { attribute: "file", .. }));
    }
}
