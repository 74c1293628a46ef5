use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest generated dimension, in canvas pixels
pub const MIN_SHAPE_SIZE: u32 = 20;
/// Largest generated dimension, in canvas pixels
pub const MAX_SHAPE_SIZE: u32 = 150;

/// A shape drawn on the shared canvas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub id: String,
    #[serde(flatten)]
    pub geometry: Geometry,
    pub x: u32,
    pub y: u32,
    pub color: String,
    #[serde(default)]
    pub selected: bool,
}

/// Kind-specific dimensions, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Circle { radius: u32 },
    Square { size: u32 },
    Rectangle { width: u32, height: u32 },
    Triangle { base: u32, height: u32 },
}

/// Kind of shape, without dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Circle,
    Square,
    Rectangle,
    Triangle,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Circle,
        ShapeKind::Square,
        ShapeKind::Rectangle,
        ShapeKind::Triangle,
    ];
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeKind::Circle => write!(f, "circle"),
            ShapeKind::Square => write!(f, "square"),
            ShapeKind::Rectangle => write!(f, "rectangle"),
            ShapeKind::Triangle => write!(f, "triangle"),
        }
    }
}

impl std::str::FromStr for ShapeKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "circle" => Ok(ShapeKind::Circle),
            "square" => Ok(ShapeKind::Square),
            "rectangle" => Ok(ShapeKind::Rectangle),
            "triangle" => Ok(ShapeKind::Triangle),
            _ => Err(format!("Unknown shape kind: {}", s)),
        }
    }
}

impl Geometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Square { .. } => ShapeKind::Square,
            Geometry::Rectangle { .. } => ShapeKind::Rectangle,
            Geometry::Triangle { .. } => ShapeKind::Triangle,
        }
    }
}

impl Shape {
    pub fn new(geometry: Geometry, x: u32, y: u32, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            geometry,
            x,
            y,
            color: color.into(),
            selected: false,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }
}

/// Generates randomly placed and sized shapes that fit a canvas
#[derive(Debug, Clone, Copy)]
pub struct ShapeFactory {
    width: u32,
    height: u32,
}

impl ShapeFactory {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn generate<R: Rng + ?Sized>(&self, kind: ShapeKind, color: &str, rng: &mut R) -> Shape {
        let mut size = || rng.gen_range(MIN_SHAPE_SIZE..=MAX_SHAPE_SIZE);
        let geometry = match kind {
            ShapeKind::Circle => Geometry::Circle { radius: size() },
            ShapeKind::Square => Geometry::Square { size: size() },
            ShapeKind::Rectangle => Geometry::Rectangle {
                width: size(),
                height: size(),
            },
            ShapeKind::Triangle => Geometry::Triangle {
                base: size(),
                height: size(),
            },
        };

        // Position is the top-left anchor; a zero-sized canvas pins it at the origin
        let x = rng.gen_range(0..self.width.max(1));
        let y = rng.gen_range(0..self.height.max(1));

        Shape::new(geometry, x, y, color)
    }
}
