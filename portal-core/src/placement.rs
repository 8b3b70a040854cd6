//! Free-position search around an origin.
//!
//! Candidates are generated ring by ring outward from the origin cell and the
//! first one whose footprint is unoccupied (and, optionally, reachable in a
//! straight line without crossing a wall) wins. This is a greedy nearest fit,
//! not an optimal packing.

use std::collections::HashSet;
use std::f64::consts::PI;

use tracing::{debug, trace};

use crate::{Footprint, Grid, ObstacleQuery, Point, Rect};

/// Default number of rings scanned around the origin.
pub const DEFAULT_MAX_RINGS: u32 = 10;

/// A candidate top-left position and the ring it was generated on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub ring: u32,
    pub position: Point,
}

/// Lazily generated candidate positions, nearest ring first.
///
/// Ring 0 is the single cell containing the origin. Ring `k` samples a circle
/// of radius `k` cells at `8k` evenly spaced angles, ascending from 0, so the
/// arc length between samples stays close to one cell.
pub struct Candidates<'g, G: ?Sized> {
    grid: &'g G,
    center: Point,
    max_rings: u32,
    ring: u32,
    sample: u32,
}

impl<G: Grid + ?Sized> Iterator for Candidates<'_, G> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.ring == 0 {
            self.ring = 1;
            let position = self.grid.top_left_of(&self.center.offset(-1.0, -1.0));
            return Some(Candidate { ring: 0, position });
        }

        if self.ring > self.max_rings {
            return None;
        }

        let samples = 8 * self.ring;
        let radius = self.ring as f64 * self.grid.size();
        let theta = self.sample as f64 * PI / (4.0 * self.ring as f64);
        let sample = self
            .center
            .offset(radius * theta.cos(), radius * theta.sin());
        let candidate = Candidate {
            ring: self.ring,
            position: self.grid.top_left_of(&sample),
        };

        self.sample += 1;
        if self.sample == samples {
            self.sample = 0;
            self.ring += 1;
        }

        Some(candidate)
    }
}

/// Generates the candidate sequence for `origin`.
///
/// The origin is first snapped to the center of its cell. Deterministic: the
/// same inputs always produce the same sequence.
pub fn candidate_rings<'g, G>(grid: &'g G, origin: &Point, max_rings: u32) -> Candidates<'g, G>
where
    G: Grid + ?Sized,
{
    Candidates {
        grid,
        center: grid.center_of(origin),
        max_rings,
        ring: 0,
        sample: 0,
    }
}

/// Radial nearest-first search for a free footprint position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementSearch {
    pub max_rings: u32,
}

impl Default for PlacementSearch {
    fn default() -> Self {
        Self {
            max_rings: DEFAULT_MAX_RINGS,
        }
    }
}

impl PlacementSearch {
    pub fn new(max_rings: u32) -> Self {
        Self { max_rings }
    }

    /// Finds the nearest top-left position where `footprint` fits.
    ///
    /// With `collision`, a candidate is also rejected when the straight line
    /// from the unsnapped `origin` to the footprint's center crosses a wall.
    /// Returns `None` when every candidate is rejected; that is a normal
    /// outcome, not a fault.
    pub fn find<G, O>(
        &self,
        grid: &G,
        obstacles: &O,
        footprint: Footprint,
        origin: &Point,
        collision: bool,
    ) -> Option<Point>
    where
        G: Grid + ?Sized,
        O: ObstacleQuery + ?Sized,
    {
        let mut tested = HashSet::new();

        for candidate in candidate_rings(grid, origin, self.max_rings) {
            if !tested.insert(grid.to_cell(&candidate.position)) {
                continue;
            }

            if !is_free(grid, obstacles, footprint, &candidate.position) {
                trace!(ring = candidate.ring, x = candidate.position.x, y = candidate.position.y, "occupied");
                continue;
            }

            if collision && crosses_wall(grid, obstacles, footprint, origin, &candidate.position) {
                trace!(ring = candidate.ring, x = candidate.position.x, y = candidate.position.y, "behind wall");
                continue;
            }

            debug!(
                ring = candidate.ring,
                x = candidate.position.x,
                y = candidate.position.y,
                "found free position"
            );
            return Some(candidate.position.with_elevation(origin.elevation));
        }

        debug!(x = origin.x, y = origin.y, ?footprint, "no free position");
        None
    }
}

/// Convenience wrapper around [`PlacementSearch::find`] with the default ring count.
pub fn find_free_position<G, O>(
    grid: &G,
    obstacles: &O,
    footprint: Footprint,
    origin: &Point,
    collision: bool,
) -> Option<Point>
where
    G: Grid + ?Sized,
    O: ObstacleQuery + ?Sized,
{
    PlacementSearch::default().find(grid, obstacles, footprint, origin, collision)
}

/// Whether the footprint anchored at `top_left` overlaps no occupant.
///
/// Occupants need not be grid aligned; any overlap of the rectangles counts.
pub fn is_free<G, O>(grid: &G, obstacles: &O, footprint: Footprint, top_left: &Point) -> bool
where
    G: Grid + ?Sized,
    O: ObstacleQuery + ?Sized,
{
    let Some(occupants) = obstacles.occupants() else {
        return true;
    };
    let size = grid.size();
    let placed = Rect::new(
        top_left.x,
        top_left.y,
        footprint.width as f64 * size,
        footprint.height as f64 * size,
    );
    !occupants.iter().any(|rect| rect.overlaps(&placed))
}

fn crosses_wall<G, O>(
    grid: &G,
    obstacles: &O,
    footprint: Footprint,
    origin: &Point,
    top_left: &Point,
) -> bool
where
    G: Grid + ?Sized,
    O: ObstacleQuery + ?Sized,
{
    let size = grid.size();
    let center = top_left.offset(
        footprint.width as f64 * size / 2.0,
        footprint.height as f64 * size / 2.0,
    );
    obstacles.movement_blocked(origin, &center).unwrap_or(false)
}
