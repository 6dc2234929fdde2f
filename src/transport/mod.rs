//! Point-to-point delivery between peers.
//!
//! The mutex depends on two properties only: payloads survive the trip intact, and payloads
//! sent from one peer to another arrive in send order. Nothing is assumed about ordering across
//! different links.

pub mod channel;
pub mod tcp;

use crate::sync::lamport::PeerId;
use thiserror::Error;

pub use channel::ChannelTransport;
pub use tcp::TcpTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no link to peer {0}")]
    UnknownPeer(PeerId),
    #[error("link to peer {0} is closed")]
    Disconnected(PeerId),
    #[error("peer {0} already has a live link")]
    DuplicateLink(PeerId),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("framing error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outbound half of a link layer.
///
/// `send` must not block: the coordinator calls it while holding its own state lock. Retrying
/// failed sends is up to the implementation, callers only see the error.
pub trait Transport<M>: Send + Sync {
    fn send(&self, to: PeerId, msg: M) -> Result<(), TransportError>;
}
