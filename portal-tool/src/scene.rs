//! Scene description files for offline placement runs.

use std::path::Path;

use anyhow::Context;
use portal_core::{Grid, Rect, SceneSnapshot, SquareGrid, Wall};
use serde::Deserialize;

/// A scene as JSON: grid geometry, placed tokens and walls.
///
/// ```json
/// {
///   "grid": { "size": 100, "distance": 5 },
///   "tokens": [{ "x": 0, "y": 0, "width": 2, "height": 2 }],
///   "walls": [{ "a": { "x": 300, "y": 0 }, "b": { "x": 300, "y": 500 } }]
/// }
/// ```
///
/// Leaving out `walls` means the scene has no collision data at all, which is
/// different from an empty list.
#[derive(Debug, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub grid: SquareGrid,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
    pub walls: Option<Vec<Wall>>,
}

#[derive(Debug, Deserialize)]
pub struct TokenEntry {
    pub x: f64,
    pub y: f64,
    #[serde(default = "one")]
    pub width: f64,
    #[serde(default = "one")]
    pub height: f64,
}

fn one() -> f64 {
    1.0
}

impl SceneFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing scene {}", path.display()))
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        let size = self.grid.size();
        let occupants = self
            .tokens
            .iter()
            .map(|t| Rect::new(t.x, t.y, t.width * size, t.height * size))
            .collect();

        let snapshot = SceneSnapshot::new(occupants);
        match &self.walls {
            Some(walls) => snapshot.with_walls(walls.clone()),
            None => snapshot,
        }
    }
}
