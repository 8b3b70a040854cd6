//! Peer-messaging channel used to reach the responder.

use std::fmt;
use std::future::Future;

use portal_core::{AsyncDocumentStore, Session};
use tracing::debug;

use crate::handler::handle_request;
use crate::protocol::{MutationEnvelope, MutationResponse};

/// Error from the messaging layer itself, as opposed to a refusal by the peer.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Single-responder request/response messaging.
///
/// Each call delivers one envelope to one peer and resolves with that peer's
/// single answer. An absent peer never answers; bounding the wait is the
/// caller's job.
pub trait PeerChannel: Send + Sync {
    type Peer: Clone + fmt::Debug + fmt::Display + Send + Sync;

    fn send_request(
        &self,
        peer: &Self::Peer,
        envelope: MutationEnvelope,
    ) -> impl Future<Output = Result<MutationResponse, ChannelError>> + Send;
}

/// In-process channel whose only peer runs mutations against a shared store.
///
/// Fits hosts where the privileged user lives in the same process, and tests.
pub struct LoopbackChannel<S> {
    responder: String,
    session: Session,
    store: S,
}

impl<S: AsyncDocumentStore> LoopbackChannel<S> {
    /// Creates a channel answering as `responder` with `session`'s privileges.
    pub fn new(responder: impl Into<String>, session: Session, store: S) -> Self {
        Self {
            responder: responder.into(),
            session,
            store,
        }
    }

    pub fn responder(&self) -> &str {
        &self.responder
    }
}

impl<S: AsyncDocumentStore> PeerChannel for LoopbackChannel<S> {
    type Peer = String;

    async fn send_request(
        &self,
        peer: &String,
        envelope: MutationEnvelope,
    ) -> Result<MutationResponse, ChannelError> {
        if *peer != self.responder {
            debug!(%peer, "no such peer; request will never be answered");
            std::future::pending::<()>().await;
        }
        Ok(handle_request(&self.store, &self.session, envelope).await)
    }
}
