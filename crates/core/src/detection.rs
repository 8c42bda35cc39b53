use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A pixel-space coordinate. Serialized as a two-element `[x, y]` array,
/// which is how recognition backends emit polygon corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Point { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A detection whose polygon has no corners, so neither of its layout keys
/// can be computed. `index` is its position in the recognizer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Detection #{index} has an empty polygon")]
pub struct MalformedDetection {
    pub index: usize,
}

/// One recognized text token and the polygon that bounds it.
///
/// The polygon is usually the four corners reported by the recognizer and is
/// not guaranteed to be axis-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub text: String,
    pub polygon: Vec<Point>,
}

impl Detection {
    pub fn new(text: impl Into<String>, polygon: impl Into<Vec<Point>>) -> Self {
        Self { text: text.into(), polygon: polygon.into() }
    }

    /// Axis-aligned box with its top-left corner at `(x, y)`, corners listed
    /// clockwise from the top-left.
    pub fn from_rect(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(
            text,
            vec![
                Point::new(x, y),
                Point::new(x + width, y),
                Point::new(x + width, y + height),
                Point::new(x, y + height),
            ],
        )
    }

    /// Mean y of the polygon corners. `None` for an empty polygon.
    pub fn vertical_center(&self) -> Option<f32> {
        if self.polygon.is_empty() {
            return None;
        }
        let sum: f32 = self.polygon.iter().map(|p| p.y).sum();
        Some(sum / self.polygon.len() as f32)
    }

    /// Smallest x of the polygon corners. `None` for an empty polygon.
    pub fn left_edge(&self) -> Option<f32> {
        self.polygon.iter().map(|p| p.x).reduce(f32::min)
    }
}
