use serde::{Deserialize, Serialize};

use super::shape::Shape;

/// Color used when nothing has been selected yet
pub const DEFAULT_COLOR: &str = "#FF0000";
/// Outline color used when nothing has been selected yet
pub const DEFAULT_STROKE_STYLE: &str = "#000000";

/// The replicated document: drawn shapes plus UI preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedState {
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default = "default_color")]
    pub selected_color: String,
    #[serde(default)]
    pub selected_theme: Theme,
    #[serde(default = "default_stroke_style")]
    pub stroke_style: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_stroke_style() -> String {
    DEFAULT_STROKE_STYLE.to_string()
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            shapes: Vec::new(),
            selected_color: default_color(),
            selected_theme: Theme::default(),
            stroke_style: default_stroke_style(),
        }
    }
}

impl SharedState {
    pub fn with_shapes(shapes: Vec<Shape>) -> Self {
        Self {
            shapes,
            ..Default::default()
        }
    }

    /// Returns a copy without the most recently drawn shape
    pub fn without_last_shape(&self) -> Self {
        let mut next = self.clone();
        next.shapes.pop();
        next
    }
}

/// Canvas color scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
            Theme::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            _ => Err(format!("Unknown theme: {}", s)),
        }
    }
}

/// Canonical form of a color string (`#ff0000` and `#FF0000` are the same color)
pub fn normalize_color(color: &str) -> String {
    color.trim().to_uppercase()
}
