//! SwarmChannel - reaches a responder peer through the swarm driver.

use libp2p::PeerId;
use portal_router::{ChannelError, MutationEnvelope, MutationResponse, PeerChannel};
use tokio::sync::{mpsc, oneshot};

/// Command sent to the swarm driver.
pub enum Command {
    /// Send a request to a peer.
    SendRequest {
        peer: PeerId,
        envelope: MutationEnvelope,
        response_tx: oneshot::Sender<Result<MutationResponse, ChannelError>>,
    },
}

/// The swarm exposed as a `PeerChannel`.
///
/// Sends requests via the command channel and waits for responses.
#[derive(Clone)]
pub struct SwarmChannel {
    command_tx: mpsc::Sender<Command>,
}

impl SwarmChannel {
    pub fn new(command_tx: mpsc::Sender<Command>) -> Self {
        Self { command_tx }
    }
}

impl PeerChannel for SwarmChannel {
    type Peer = PeerId;

    async fn send_request(
        &self,
        peer: &PeerId,
        envelope: MutationEnvelope,
    ) -> Result<MutationResponse, ChannelError> {
        let (tx, rx) = oneshot::channel();

        self.command_tx
            .send(Command::SendRequest {
                peer: *peer,
                envelope,
                response_tx: tx,
            })
            .await
            .map_err(|_| ChannelError::ConnectionClosed)?;

        rx.await.map_err(|_| ChannelError::ConnectionClosed)?
    }
}
