use serde::{Deserialize, Serialize};

/// A position in continuous canvas coordinates.
///
/// `elevation` is never interpreted by placement logic; it is carried from the
/// origin to the result unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            elevation: None,
        }
    }

    pub fn with_elevation(self, elevation: Option<f64>) -> Self {
        Self { elevation, ..self }
    }

    /// Returns this point moved by `(dx, dy)`, keeping the elevation.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            elevation: self.elevation,
        }
    }

    /// Planar distance, ignoring elevation.
    pub fn distance_to(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Width and height of a placeable object, in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub const UNIT: Footprint = Footprint {
        width: 1,
        height: 1,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The larger of the two dimensions.
    pub fn extent(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open containment: the left and top edges are inside, the right and
    /// bottom edges are not. Degenerate rectangles contain nothing.
    pub fn contains(&self, point: &Point) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    /// Whether the interiors of the two rectangles overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A straight line segment between two canvas points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: Point,
    pub b: Point,
}

impl Segment {
    pub fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Whether this segment touches or crosses `other`.
    pub fn intersects(&self, other: &Segment) -> bool {
        let d1 = orientation(&other.a, &other.b, &self.a);
        let d2 = orientation(&other.a, &other.b, &self.b);
        let d3 = orientation(&self.a, &self.b, &other.a);
        let d4 = orientation(&self.a, &self.b, &other.b);

        if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
            && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
        {
            return true;
        }

        (d1 == 0.0 && on_segment(&other.a, &other.b, &self.a))
            || (d2 == 0.0 && on_segment(&other.a, &other.b, &self.b))
            || (d3 == 0.0 && on_segment(&self.a, &self.b, &other.a))
            || (d4 == 0.0 && on_segment(&self.a, &self.b, &other.b))
    }

    /// Whether `ray` meets this segment anywhere past its starting point.
    ///
    /// A ray that starts on the segment (a wall through, or ending at, the
    /// point it leaves from) is only blocked when it runs along the segment.
    pub fn blocks_ray(&self, ray: &Segment) -> bool {
        let starts_on =
            orientation(&self.a, &self.b, &ray.a) == 0.0 && on_segment(&self.a, &self.b, &ray.a);
        if !starts_on {
            return self.intersects(ray);
        }

        if orientation(&self.a, &self.b, &ray.b) != 0.0 {
            return false;
        }
        on_segment(&self.a, &self.b, &ray.b)
            || [self.a, self.b]
                .iter()
                .any(|end| !same_spot(end, &ray.a) && on_segment(&ray.a, &ray.b, end))
    }
}

/// Cross product of `(b - a)` and `(c - a)`.
fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn same_spot(a: &Point, b: &Point) -> bool {
    a.x == b.x && a.y == b.y
}

/// Assumes `p` is collinear with `a`-`b`.
fn on_segment(a: &Point, b: &Point, p: &Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}
