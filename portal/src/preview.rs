use std::future::Future;

use portal_core::{Grid, Point};

/// The circular area shown while the user chooses where a portal opens.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePreview {
    /// Diameter in scene distance units.
    pub distance: f64,
    pub color: String,
    /// Texture drawn inside the circle; empty for a plain fill.
    pub texture: String,
    pub origin: Option<Point>,
    /// Maximum distance from `origin` a pick may land at.
    pub range: Option<f64>,
}

impl TemplatePreview {
    /// Radius of the drawn circle in canvas pixels.
    pub fn radius_pixels<G: Grid + ?Sized>(&self, grid: &G) -> f64 {
        self.distance * (grid.size() / grid.distance()) / 2.0
    }

    /// Whether `point` is within range of the origin. Without an origin or a
    /// range every point is.
    pub fn in_range<G: Grid + ?Sized>(&self, grid: &G, point: &Point) -> bool {
        match (&self.origin, self.range) {
            (Some(origin), Some(range)) => grid.measure_distance(origin, point) <= range,
            _ => true,
        }
    }
}

/// Interactive point selection supplied by the host.
pub trait PositionPicker: Send + Sync {
    /// Shows `preview` and waits for the user. `None` means cancelled.
    fn pick(&self, preview: &TemplatePreview) -> impl Future<Output = Option<Point>> + Send;
}
