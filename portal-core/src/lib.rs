//! Core types for placing tokens on a game canvas and mutating the documents
//! behind them.
//!
//! Core concepts:
//! - **Grid**: the host's cell geometry (snapping, cell size, distance units)
//! - **ObstacleQuery**: what currently occupies the scene, and where walls are
//! - **PlacementSearch**: nearest free position for a footprint, scanned ring by ring
//! - **Document**: a host database record addressed by a dotted [`DocumentId`]
//! - **DocumentStore**: permission-guarded document mutations on behalf of a [`Session`]
//!
//! # Example
//!
//! ```
//! use portal_core::{find_free_position, Footprint, Point, Rect, SceneSnapshot, SquareGrid};
//!
//! let grid = SquareGrid::new(100.0, 5.0);
//! // Something already stands on the origin cell.
//! let scene = SceneSnapshot::new(vec![Rect::new(0.0, 0.0, 100.0, 100.0)]);
//!
//! let position = find_free_position(&grid, &scene, Footprint::UNIT, &Point::new(0.0, 0.0), true);
//! assert_eq!(position, Some(Point::new(100.0, 0.0)));
//! ```

mod async_store;
pub mod document;
mod geometry;
mod grid;
mod obstacles;
pub mod placement;
mod store;

pub use async_store::AsyncDocumentStore;
pub use document::{
    merge_json, Capability, Document, DocumentId, MutationOptions, Role, Session, UserId, ACTOR,
    ITEM, SCENE, TOKEN,
};
pub use geometry::{Footprint, Point, Rect, Segment};
pub use grid::{Grid, SquareGrid};
pub use obstacles::{token_rect, ObstacleQuery, SceneSnapshot, Wall};
pub use placement::{candidate_rings, find_free_position, Candidate, PlacementSearch};
pub use store::{DocumentError, DocumentStore, MemoryDocumentStore};
