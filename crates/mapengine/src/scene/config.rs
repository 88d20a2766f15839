use serde::{Deserialize, Serialize};

use super::cut::Cut;
use crate::content::Rgba;

pub const FRAME_DELAY_MS: u64 = 30;

/// Converts a duration in seconds to whole ticks of [`FRAME_DELAY_MS`].
pub fn seconds_to_ticks(seconds: f32) -> i64 {
    (seconds * 1000.0 / FRAME_DELAY_MS as f32).round() as i64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    /// Compose the background from one tile per cell.
    #[default]
    Block,
    /// Show `<scene>_overlay.png`, scaled to the map, as the background.
    Overlay,
}

/// Per-scene options. Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub top: i32,
    pub left: i32,
    pub margin: i32,
    /// Falls back to `margin`.
    pub h_margin: Option<i32>,
    /// Falls back to `margin`.
    pub v_margin: Option<i32>,
    pub window_width: u32,
    pub window_height: u32,
    pub display_type: DisplayType,
    /// Ticks per scroll step.
    pub scroll_rate: u32,
    pub display_size: (u32, u32),
    pub out_of_map: Rgba,
    pub actor_plane_suffix: String,
    pub overlay_plane_suffix: String,
    pub pre_cut: Option<Cut>,
    pub post_cut: Option<Cut>,
    pub game_over_cut: Option<Cut>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            top: 0,
            left: 0,
            margin: 3,
            h_margin: None,
            v_margin: None,
            window_width: 16,
            window_height: 12,
            display_type: DisplayType::Block,
            scroll_rate: 8,
            display_size: (800, 600),
            out_of_map: [0, 0, 0, 255],
            actor_plane_suffix: "_actors".to_string(),
            overlay_plane_suffix: "_overlay".to_string(),
            pre_cut: None,
            post_cut: None,
            game_over_cut: None,
        }
    }
}

impl SceneConfig {
    pub fn h_margin(&self) -> i32 {
        self.h_margin.unwrap_or(self.margin)
    }

    pub fn v_margin(&self) -> i32 {
        self.v_margin.unwrap_or(self.margin)
    }

    /// Pixel size of one cell.
    pub fn blocksize(&self) -> u32 {
        (self.display_size.0 / self.window_width.max(1)).max(1)
    }

    pub fn game_over_cut(&self) -> Cut {
        self.game_over_cut.clone().unwrap_or_else(Cut::game_over)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: SceneConfig = serde_json::from_str("{}").expect("config");
        assert_eq!(config, SceneConfig::default());
        assert_eq!(config.blocksize(), 50);
        assert_eq!(config.h_margin(), 3);
    }

    #[test]
    fn axis_margins_override_the_shared_margin() {
        let config: SceneConfig =
            serde_json::from_str(r#"{"margin": 1, "v_margin": 0, "display_type": "overlay"}"#)
                .expect("config");
        assert_eq!(config.h_margin(), 1);
        assert_eq!(config.v_margin(), 0);
        assert_eq!(config.display_type, DisplayType::Overlay);
    }

    #[test]
    fn seconds_convert_to_whole_ticks() {
        assert_eq!(seconds_to_ticks(0.0), 0);
        assert_eq!(seconds_to_ticks(0.3), 10);
        assert_eq!(seconds_to_ticks(2.0), 67);
    }
}
