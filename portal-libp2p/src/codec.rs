//! Wire framing for the mutation protocol.

use std::io;

use async_trait::async_trait;
use futures::prelude::*;
use libp2p::StreamProtocol;
use libp2p::request_response;
use portal_router::{MutationEnvelope, MutationResponse, PROTOCOL_NAME};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Default cap on a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Length-prefixed CBOR codec for routed mutations.
///
/// Each message is a 4-byte big-endian length followed by the CBOR body.
/// Frames above `max_frame` are refused in both directions.
#[derive(Debug, Clone)]
pub struct PortalCodec {
    max_frame: usize,
}

impl PortalCodec {
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Default for PortalCodec {
    fn default() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }
}

#[async_trait]
impl request_response::Codec for PortalCodec {
    type Protocol = StreamProtocol;
    type Request = MutationEnvelope;
    type Response = MutationResponse;

    async fn read_request<T>(&mut self, _protocol: &StreamProtocol, io: &mut T) -> io::Result<MutationEnvelope>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_frame(io, self.max_frame).await
    }

    async fn read_response<T>(&mut self, _protocol: &StreamProtocol, io: &mut T) -> io::Result<MutationResponse>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_frame(io, self.max_frame).await
    }

    async fn write_request<T>(&mut self, _protocol: &StreamProtocol, io: &mut T, req: MutationEnvelope) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &req, self.max_frame).await
    }

    async fn write_response<T>(&mut self, _protocol: &StreamProtocol, io: &mut T, res: MutationResponse) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &res, self.max_frame).await
    }
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

async fn read_frame<T, M>(io: &mut T, max_frame: usize) -> io::Result<M>
where
    T: AsyncRead + Unpin + Send,
    M: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    io.read_exact(&mut prefix).await?;
    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_frame {
        return Err(invalid(format!("frame of {len} bytes exceeds {max_frame}")));
    }

    let mut body = vec![0u8; len];
    io.read_exact(&mut body).await?;
    ciborium::from_reader(body.as_slice()).map_err(|e| invalid(e.to_string()))
}

async fn write_frame<T, M>(io: &mut T, message: &M, max_frame: usize) -> io::Result<()>
where
    T: AsyncWrite + Unpin + Send,
    M: Serialize,
{
    let mut body = Vec::new();
    ciborium::into_writer(message, &mut body).map_err(|e| invalid(e.to_string()))?;
    if body.len() > max_frame {
        return Err(invalid(format!("frame of {} bytes exceeds {max_frame}", body.len())));
    }
    let prefix = u32::try_from(body.len())
        .map_err(|_| invalid("frame length overflows the prefix"))?
        .to_be_bytes();

    io.write_all(&prefix).await?;
    io.write_all(&body).await?;
    io.flush().await
}

/// Protocol identifier the behaviour registers.
pub fn protocol() -> StreamProtocol {
    StreamProtocol::new(PROTOCOL_NAME)
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use futures::io::Cursor;
    use portal_core::{DocumentId, MutationOptions};
    use portal_router::MutationRequest;

    use super::*;

    fn delete_envelope() -> MutationEnvelope {
        MutationEnvelope::new(
            3,
            MutationRequest::Delete {
                target: DocumentId::from("Scene.s.Token.t"),
                options: MutationOptions::new(),
            },
        )
    }

    #[test]
    fn framed_envelope_reads_back() {
        let envelope = delete_envelope();

        let mut wire = Cursor::new(Vec::new());
        block_on(write_frame(&mut wire, &envelope, DEFAULT_MAX_FRAME)).unwrap();

        let bytes = wire.into_inner();
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(len, bytes.len() - 4);

        let mut reader = Cursor::new(bytes);
        let recovered: MutationEnvelope = block_on(read_frame(&mut reader, DEFAULT_MAX_FRAME)).unwrap();
        assert_eq!(recovered, envelope);
    }

    #[test]
    fn oversized_length_prefix_is_refused() {
        let mut bytes = (DEFAULT_MAX_FRAME as u32 + 1).to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        let mut reader = Cursor::new(bytes);

        let err = block_on(read_frame::<_, MutationResponse>(&mut reader, DEFAULT_MAX_FRAME)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn writer_honours_a_small_cap() {
        let mut wire = Cursor::new(Vec::new());
        let err = block_on(write_frame(&mut wire, &delete_envelope(), 8)).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(wire.into_inner().is_empty());
    }
}
