use serde::{Deserialize, Serialize};

use crate::Point;

/// Grid service supplied by the host scene.
///
/// Cells are addressed by integer column/row; cell `(0, 0)` spans
/// `[0, size) x [0, size)` in canvas coordinates.
pub trait Grid {
    /// Cell edge length in canvas pixels.
    fn size(&self) -> f64;

    /// Scene distance units covered by one cell (e.g. 5 feet).
    fn distance(&self) -> f64;

    /// The cell containing `point`.
    fn to_cell(&self, point: &Point) -> (i64, i64) {
        let size = self.size();
        ((point.x / size).floor() as i64, (point.y / size).floor() as i64)
    }

    /// Top-left corner of the cell containing `point`.
    fn top_left_of(&self, point: &Point) -> Point {
        let (col, row) = self.to_cell(point);
        let size = self.size();
        Point::new(col as f64 * size, row as f64 * size).with_elevation(point.elevation)
    }

    /// Center of the cell containing `point`.
    fn center_of(&self, point: &Point) -> Point {
        let half = self.size() / 2.0;
        self.top_left_of(point).offset(half, half)
    }

    /// Distance between two points in scene units.
    fn measure_distance(&self, a: &Point, b: &Point) -> f64 {
        a.distance_to(b) / self.size() * self.distance()
    }
}

/// A plain square grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquareGrid {
    pub size: f64,
    pub distance: f64,
}

impl SquareGrid {
    pub fn new(size: f64, distance: f64) -> Self {
        Self { size, distance }
    }
}

impl Default for SquareGrid {
    fn default() -> Self {
        Self {
            size: 100.0,
            distance: 5.0,
        }
    }
}

impl Grid for SquareGrid {
    fn size(&self) -> f64 {
        self.size
    }

    fn distance(&self) -> f64 {
        self.distance
    }
}
