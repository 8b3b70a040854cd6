//! libp2p transport for routed mutations.
//!
//! # Architecture
//!
//! - `SwarmChannel` implements `PeerChannel` by handing requests to the driver
//! - `PortalCodec` handles CBOR serialization over libp2p streams
//! - `run_swarm` answers inbound requests with `handle_request` on the local store
//!
//! # Example
//!
//! ```ignore
//! use portal_libp2p::{run_swarm, SwarmChannel};
//! use portal_router::Router;
//!
//! let (command_tx, command_rx) = mpsc::channel(32);
//! tokio::spawn(run_swarm(swarm, store.clone(), session.clone(), command_rx));
//!
//! let router = Router::new(store, SwarmChannel::new(command_tx), session, gm_peer_id);
//! router.update(&token, json!({"x": 300}), MutationOptions::new()).await?;
//! ```

mod codec;
mod swarm_channel;

pub use codec::{protocol, PortalCodec, DEFAULT_MAX_FRAME};
pub use swarm_channel::{Command, SwarmChannel};

use std::collections::HashMap;

use futures::StreamExt;
use libp2p::request_response::{self, OutboundRequestId};
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::Swarm;
use portal_core::{AsyncDocumentStore, Session};
use portal_router::{handle_request, ChannelError, MutationResponse};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Behaviour carrying the mutation protocol.
#[derive(NetworkBehaviour)]
pub struct PortalBehaviour {
    pub mutate: request_response::Behaviour<PortalCodec>,
}

impl PortalBehaviour {
    /// Create a new behaviour with the mutation protocol.
    pub fn new() -> Self {
        let config = request_response::Config::default();
        let mutate = request_response::Behaviour::new(
            [(protocol(), request_response::ProtocolSupport::Full)],
            config,
        );
        Self { mutate }
    }
}

impl Default for PortalBehaviour {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive the swarm, processing commands and events.
///
/// This function runs the swarm event loop, handling:
/// - Outbound requests via the command channel
/// - Inbound requests by calling the handler with the local store and `session`
/// - Response matching for pending requests
pub async fn run_swarm<S>(
    mut swarm: Swarm<PortalBehaviour>,
    local_store: S,
    session: Session,
    mut command_rx: mpsc::Receiver<Command>,
) where
    S: AsyncDocumentStore,
{
    let mut pending_requests: HashMap<
        OutboundRequestId,
        oneshot::Sender<Result<MutationResponse, ChannelError>>,
    > = HashMap::new();

    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => {
                match cmd {
                    Command::SendRequest { peer, envelope, response_tx } => {
                        let request_id = swarm.behaviour_mut().mutate.send_request(&peer, envelope);
                        pending_requests.insert(request_id, response_tx);
                    }
                }
            }

            event = swarm.select_next_some() => {
                match event {
                    SwarmEvent::Behaviour(PortalBehaviourEvent::Mutate(req_res_event)) => {
                        match req_res_event {
                            request_response::Event::Message { peer, message, .. } => {
                                match message {
                                    request_response::Message::Request { request, channel, .. } => {
                                        debug!(%peer, request_id = request.request_id, "inbound mutation");
                                        let response = handle_request(&local_store, &session, request).await;
                                        if swarm.behaviour_mut().mutate.send_response(channel, response).is_err() {
                                            warn!(%peer, "requester went away before the response");
                                        }
                                    }
                                    request_response::Message::Response { request_id, response, .. } => {
                                        if let Some(tx) = pending_requests.remove(&request_id) {
                                            let _ = tx.send(Ok(response));
                                        }
                                    }
                                }
                            }
                            request_response::Event::OutboundFailure { peer, request_id, error, .. } => {
                                debug!(%peer, ?request_id, %error, "mutation request failed");
                                if let Some(tx) = pending_requests.remove(&request_id) {
                                    let _ = tx.send(Err(ChannelError::RequestFailed(error.to_string())));
                                }
                            }
                            request_response::Event::InboundFailure { peer, error, .. } => {
                                warn!(%peer, %error, "inbound mutation failed");
                            }
                            request_response::Event::ResponseSent { .. } => {}
                        }
                    }
                    SwarmEvent::NewListenAddr { address, .. } => {
                        debug!(%address, "listening");
                    }
                    _ => {}
                }
            }
        }
    }
}
