use serde::{Deserialize, Serialize};

use crate::{Document, Grid, Point, Rect, Segment};

/// Read access to what is currently on the scene.
///
/// Both methods may report that the information is unavailable; callers treat
/// that as "nothing in the way" rather than as an error.
pub trait ObstacleQuery {
    /// Bounding rectangles of every placed occupant, or `None` without data.
    fn occupants(&self) -> Option<&[Rect]>;

    /// Whether a straight move from `from` to `to` hits static geometry, or
    /// `None` when there is no collision backend. Geometry touching only
    /// `from` itself does not count.
    fn movement_blocked(&self, from: &Point, to: &Point) -> Option<bool>;
}

/// A wall on the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub a: Point,
    pub b: Point,
    #[serde(default = "default_blocks_movement")]
    pub blocks_movement: bool,
}

fn default_blocks_movement() -> bool {
    true
}

impl Wall {
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            a,
            b,
            blocks_movement: true,
        }
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.a, self.b)
    }
}

/// Point-in-time copy of scene occupants and walls.
///
/// Not synchronized with the scene: two placements racing against separate
/// snapshots can both succeed into the same cells.
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    occupants: Option<Vec<Rect>>,
    walls: Option<Vec<Wall>>,
}

impl SceneSnapshot {
    /// A snapshot with known occupants and no collision backend.
    pub fn new(occupants: Vec<Rect>) -> Self {
        Self {
            occupants: Some(occupants),
            walls: None,
        }
    }

    /// A snapshot that knows nothing about the scene.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Builds occupant rectangles from token documents (`x`, `y` in pixels,
    /// `width`, `height` in cells).
    pub fn from_tokens<'a, G>(grid: &G, tokens: impl IntoIterator<Item = &'a Document>) -> Self
    where
        G: Grid + ?Sized,
    {
        let occupants = tokens
            .into_iter()
            .filter_map(|token| token_rect(grid, token))
            .collect();
        Self::new(occupants)
    }

    pub fn with_walls(mut self, walls: Vec<Wall>) -> Self {
        self.walls = Some(walls);
        self
    }
}

impl ObstacleQuery for SceneSnapshot {
    fn occupants(&self) -> Option<&[Rect]> {
        self.occupants.as_deref()
    }

    fn movement_blocked(&self, from: &Point, to: &Point) -> Option<bool> {
        let walls = self.walls.as_ref()?;
        let ray = Segment::new(*from, *to);
        Some(
            walls
                .iter()
                .filter(|w| w.blocks_movement)
                .any(|w| w.segment().blocks_ray(&ray)),
        )
    }
}

/// Bounding rectangle of a token document, if it carries a position.
pub fn token_rect<G: Grid + ?Sized>(grid: &G, token: &Document) -> Option<Rect> {
    let x = token.data.get("x")?.as_f64()?;
    let y = token.data.get("y")?.as_f64()?;
    let width = token.data.get("width").and_then(|v| v.as_f64()).unwrap_or(1.0);
    let height = token.data.get("height").and_then(|v| v.as_f64()).unwrap_or(1.0);
    Some(Rect::new(x, y, width * grid.size(), height * grid.size()))
}
