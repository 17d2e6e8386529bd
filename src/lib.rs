#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod parse;
pub mod render;
pub mod session;

use std::fmt;

use render::{OutputFormat, RenderOptions, TurtleCommand, ViewParameters};
use serde::Serialize;
use session::Session;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    log::set_logger(&DEFAULT_LOGGER).expect("error initializing logger");
    log::set_max_level(LevelFilter::Debug);
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[derive(Debug, Serialize)]
struct BoundsExport {
    min: [f64; 3],
    max: [f64; 3],
}

/// Web viewer entry point.
#[wasm_bindgen]
pub struct Engine {
    initialized: bool,
    session: Session,
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Engine {
        Engine { initialized: true, session: Session::new() }
    }

    #[wasm_bindgen]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Parses a text script and makes it the current command list.
    #[wasm_bindgen]
    pub fn load_script(&mut self, text: &str) -> Result<usize, JsValue> {
        self.session.load_script(text).map_err(to_js_error)
    }

    /// Sets the command list from an array of command objects (`{ "op": "forward", ... }`).
    #[wasm_bindgen]
    pub fn set_commands(&mut self, commands: JsValue) -> Result<(), JsValue> {
        let commands: Vec<TurtleCommand> =
            serde_wasm_bindgen::from_value(commands).map_err(to_js_error)?;
        self.session.set_commands(commands);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn load_contours(&mut self, text: &str) -> Result<usize, JsValue> {
        self.session.load_contours(text).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn load_surface(&mut self, text: &str) -> Result<usize, JsValue> {
        self.session.load_surface(text).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn load_wrapped_surface(&mut self, text: &str) -> Result<usize, JsValue> {
        self.session.load_wrapped_surface(text).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn load_mesh(&mut self, name: &str, text: &str) -> Result<usize, JsValue> {
        self.session.load_mesh(name, text).map_err(to_js_error)
    }

    /// Applies an XML settings document.
    #[wasm_bindgen]
    pub fn load_config(&mut self, xml: &str) -> Result<(), JsValue> {
        self.session.load_config(xml).map_err(to_js_error)
    }

    /// Replaces the render options with a JS object; missing fields take defaults.
    #[wasm_bindgen]
    pub fn set_options(&mut self, options: JsValue) -> Result<(), JsValue> {
        let options: RenderOptions = serde_wasm_bindgen::from_value(options).map_err(to_js_error)?;
        self.session.context_mut().options = options;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn set_view(&mut self, view: JsValue) -> Result<(), JsValue> {
        let view: ViewParameters = serde_wasm_bindgen::from_value(view).map_err(to_js_error)?;
        self.session.context_mut().view = view;
        Ok(())
    }

    /// Renders `obj`, `ray`, `ps` or `bbox` into `{ main, materials? }`.
    #[wasm_bindgen]
    pub fn render(&self, format: &str) -> Result<JsValue, JsValue> {
        let format: OutputFormat = format.parse().map_err(to_js_error)?;
        let text = self.session.render_text(format).map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&text).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Scene bounds as `{ min, max }`, or `null` for an empty scene.
    #[wasm_bindgen]
    pub fn get_bounding_box(&self) -> Result<JsValue, JsValue> {
        let bounds = self.session.bounding_box().map_err(to_js_error)?;
        let export = bounds.map(|b| BoundsExport { min: b.min.to_array(), max: b.max.to_array() });
        serde_wasm_bindgen::to_value(&export).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Immediate-mode draw calls for a WebGL viewer.
    #[wasm_bindgen]
    pub fn get_display_list(&self) -> Result<JsValue, JsValue> {
        let list = self.session.display_list().map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&list).map_err(|err| JsError::new(&err.to_string()).into())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        log::warn!("{message}");
        JsValue::NULL
    }
}
