// crates/fmm-core/src/model/style.rs
//
// Subtitle style — either the project default or a per-segment override.
// Colors are `#RRGGBB` or empty (meaning "inherit"); empty is kept rather
// than `Option` so a style can round-trip through JSON without losing the
// distinction between "not set" and "explicitly cleared".

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StylePosition {
    #[default]
    BottomCenter,
    TopCenter,
    BottomLeft,
    BottomRight,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    pub font_family: String,
    pub font_size: u32,
    pub font_bold: bool,
    pub font_italic: bool,
    pub font_color: String,
    pub outline_color: String,
    pub outline_width: f32,
    pub bg_color: String,
    pub position: StylePosition,
    pub margin_bottom: u32,
    pub custom_x: f32,
    pub custom_y: f32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 32,
            font_bold: false,
            font_italic: false,
            font_color: "#FFFFFF".to_string(),
            outline_color: "#000000".to_string(),
            outline_width: 2.0,
            bg_color: String::new(),
            position: StylePosition::BottomCenter,
            margin_bottom: 40,
            custom_x: 0.5,
            custom_y: 0.9,
        }
    }
}
