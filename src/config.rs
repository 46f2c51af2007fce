//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::gpu::Color;

/// Knobs chosen once when the engine starts.
///
/// ```
/// use std::time::Duration;
/// use kiln_ngin::{Color, EngineConfig};
///
/// let config = EngineConfig::default()
///     .with_clear_colour(Color::WHITE)
///     .with_color_texture_ttl(Duration::from_secs(30));
/// assert_eq!(config.clear_colour, Color::WHITE);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub clear_colour: Color,
    /// Directory relative URLs resolve against on native targets. Ignored on
    /// wasm where URLs resolve against the page origin.
    pub asset_root: PathBuf,
    pub window_title: String,
    /// Colour textures unused for longer than this are released. `None` keeps
    /// them until the cache is cleared.
    pub color_texture_ttl: Option<Duration>,
    /// How often the colour texture sweep runs when a TTL is set.
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clear_colour: Color::BLACK,
            asset_root: PathBuf::from("assets"),
            window_title: "kiln".to_owned(),
            color_texture_ttl: None,
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    pub fn with_clear_colour(mut self, colour: impl Into<Color>) -> Self {
        self.clear_colour = colour.into();
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    pub fn with_color_texture_ttl(mut self, ttl: Duration) -> Self {
        self.color_texture_ttl = Some(ttl);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
