//! Privileged mutation routing.
//!
//! A client without permission over a document asks a privileged peer (the
//! responder) to perform the mutation instead, and waits a bounded time for
//! the single answer.
//!
//! # Architecture
//!
//! - `Router` decides local vs routed and re-resolves returned identifiers
//! - `PeerChannel` is the messaging seam; `LoopbackChannel` serves in-process
//! - `handle_request` runs incoming mutations on the responder's store
//!
//! # Example
//!
//! ```ignore
//! use portal_router::{LoopbackChannel, Router};
//!
//! let channel = LoopbackChannel::new("gm", gm_session, store.clone());
//! let router = Router::new(store, channel, player_session, "gm".to_string());
//!
//! let token = router.update(&token, json!({"x": 300}), MutationOptions::new()).await?;
//! ```

mod channel;
mod handler;
mod protocol;
mod router;

pub use channel::{ChannelError, LoopbackChannel, PeerChannel};
pub use handler::handle_request;
pub use protocol::{MutationEnvelope, MutationRequest, MutationResponse, PROTOCOL_NAME};
pub use router::{RouteError, Router, RouterConfig, DEFAULT_TIMEOUT};
