//! Pick a point on a scene, then spawn creatures around it or teleport a
//! token onto it; transform actors into other actors' statblocks.
//!
//! Every document write goes through a [`Router`], so players without the
//! needed permission get their changes applied by the responder.
//!
//! # Example
//!
//! ```ignore
//! use portal::{Portal, SceneContext, SpawnOptions};
//!
//! let settings = portal::load_settings();
//! let router = Router::new(store, channel, session, gm).with_config(settings.router_config());
//!
//! let spawned = Portal::new(settings)
//!     .add_creature("Aboleth", SpawnOptions::count(3))
//!     .color("#ff0000")
//!     .origin_token(&grid, &token)
//!     .range(60.0)
//!     .spawn(&router, &SceneContext::new(scene_id, grid), &picker)
//!     .await?;
//! ```

mod animation;
mod error;
mod portal;
mod preview;
pub mod settings;
pub mod transform;

pub use animation::{Easing, Fade, NoAnimation, TokenAnimator};
pub use error::{PortalError, SettingsError};
pub use portal::{CreatureSource, Portal, PostSpawnUpdate, SceneContext, SpawnOptions};
pub use preview::{PositionPicker, TemplatePreview};
pub use settings::{load_settings, load_settings_from, Settings};
pub use transform::{revert, transform};

pub use portal_core;
pub use portal_router;
pub use portal_router::Router;
