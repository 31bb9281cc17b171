//! # Module contract.
//!
//! A module is one dashboard widget (clock, weather, an overlay showing
//! memory figures). The lifecycle manager owns its thread; the renderer only
//! ever calls [`Module::draw`] and [`Module::is_ready`] through the active list.
//!
//! Methods take `&self`: an instance is shared between its own thread and the
//! renderer, so mutable state lives behind the module's own locks.

use std::sync::Arc;

use async_trait::async_trait;

use super::context::ModuleContext;
use super::section::ConfigSection;
use crate::error::ModuleError;

/// Drawing pass a module belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Drawn in the first pass.
    Base,
    /// Drawn after every base module, on top of them.
    Overlay,
}

/// Placement and enable flag shared by every module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Left edge in pixels.
    pub position_x: i32,
    /// Top edge in pixels.
    pub position_y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the module should draw at all. Off unless the section opts in.
    pub enable: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            position_x: 0,
            position_y: 0,
            width: 128,
            height: 64,
            enable: false,
        }
    }
}

impl ModuleConfig {
    /// Reads `position_x`, `position_y`, `width`, `height` and `enable`,
    /// keeping defaults for missing or invalid keys.
    pub fn from_section(section: &ConfigSection) -> Self {
        let d = Self::default();
        Self {
            position_x: clamp_i32(section.get_int("position_x", d.position_x.into())),
            position_y: clamp_i32(section.get_int("position_y", d.position_y.into())),
            width: clamp_u32(section.get_int("width", d.width.into()), d.width),
            height: clamp_u32(section.get_int("height", d.height.into()), d.height),
            enable: section.get_bool("enable", d.enable),
        }
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN.into(), i32::MAX.into()) as i32
}

fn clamp_u32(v: i64, default: u32) -> u32 {
    u32::try_from(v).unwrap_or(default)
}

/// Drawing surface handed to [`Module::draw`].
pub trait Canvas {
    /// Draws `text` with its top-left corner at `(x, y)`.
    fn text(&mut self, x: i32, y: i32, text: &str);
    /// Draws a rectangle outline, or a filled one.
    fn rect(&mut self, x: i32, y: i32, width: u32, height: u32, filled: bool);
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    /// A [`Canvas::text`] call.
    Text { x: i32, y: i32, text: String },
    /// A [`Canvas::rect`] call.
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        filled: bool,
    },
}

/// A canvas that records calls instead of drawing pixels.
#[derive(Debug, Default, Clone)]
pub struct RecordingCanvas {
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    /// Creates an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Text of every recorded text call, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                DrawOp::Rect { .. } => None,
            })
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn text(&mut self, x: i32, y: i32, text: &str) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            text: text.to_string(),
        });
    }

    fn rect(&mut self, x: i32, y: i32, width: u32, height: u32, filled: bool) {
        self.ops.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            filled,
        });
    }
}

/// # A dashboard widget driven by its own thread.
///
/// Lifecycle (on the module's thread):
/// `configure` and `configure_from_section` (if a section exists) → `setup`
/// → `run` until it returns or the context is cancelled. A rejected section
/// ends the module before `setup`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use modvisor::{Canvas, ConfigSection, Layer, Module, ModuleConfig, ModuleContext, ModuleError};
///
/// struct Banner;
///
/// #[async_trait]
/// impl Module for Banner {
///     async fn setup(&self) -> Result<(), ModuleError> { Ok(()) }
///     async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
///         ctx.cancelled().await;
///         Ok(())
///     }
///     fn draw(&self, canvas: &mut dyn Canvas) { canvas.text(0, 0, "hello"); }
///     fn is_ready(&self) -> bool { true }
///     fn configure(&self, _cfg: &ModuleConfig) {}
///     fn configure_from_section(&self, _section: &ConfigSection) -> bool { true }
///     fn layer(&self) -> Layer { Layer::Base }
/// }
/// ```
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// One-time initialization, run before [`run`](Module::run).
    async fn setup(&self) -> Result<(), ModuleError>;

    /// Body of the module thread. Returning ends the module for the rest of the process.
    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError>;

    /// Draws the module. Called by the renderer while it holds the hardware bus.
    fn draw(&self, canvas: &mut dyn Canvas);

    /// True once the module has something worth showing.
    fn is_ready(&self) -> bool;

    /// Applies placement and enable settings.
    fn configure(&self, config: &ModuleConfig);

    /// Applies a raw section. Returns `false` if the section was rejected.
    fn configure_from_section(&self, section: &ConfigSection) -> bool;

    /// Drawing pass this module belongs to.
    fn layer(&self) -> Layer;
}

/// Shared handle to a module instance.
pub type ModuleRef = Arc<dyn Module>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_config_from_section() {
        let s = ConfigSection::new("clock")
            .with("position_x", "10")
            .with("position_y", "-4")
            .with("width", "-1")
            .with("enable", "no");
        let cfg = ModuleConfig::from_section(&s);
        assert_eq!(cfg.position_x, 10);
        assert_eq!(cfg.position_y, -4);
        assert_eq!(cfg.width, 128);
        assert_eq!(cfg.height, 64);
        assert!(!cfg.enable);
    }

    #[test]
    fn module_config_is_disabled_unless_enabled() {
        assert!(!ModuleConfig::default().enable);

        let missing = ModuleConfig::from_section(&ConfigSection::new("weather").with("width", "96"));
        assert_eq!(missing.width, 96);
        assert!(!missing.enable);

        let on = ModuleConfig::from_section(&ConfigSection::new("weather").with("enable", "YES"));
        assert!(on.enable);
    }

    #[test]
    fn recording_canvas_keeps_order() {
        let mut c = RecordingCanvas::new();
        c.text(0, 0, "a");
        c.rect(1, 2, 3, 4, true);
        c.text(5, 5, "b");
        assert_eq!(c.ops().len(), 3);
        assert_eq!(c.texts(), vec!["a", "b"]);
        c.clear();
        assert!(c.ops().is_empty());
    }
}
