//! Lamport's distributed mutual exclusion.
//!
//! Every process keeps a [`RequestLedger`] of the last message heard from each peer and enters
//! the critical section once its own request is the oldest entry in (timestamp, id) order.
//! Links must be FIFO. There are no timeouts: a peer that stops answering blocks everyone.

pub mod coordinator;
pub mod ledger;
pub mod message;

pub use coordinator::{CoordinatorError, MutexCoordinator, MutexState};
pub use ledger::RequestLedger;
pub use message::{Message, MessageKind};

use crate::order::Timestamp;
use thiserror::Error;

pub type PeerId = usize;

/// A message the coordinator refuses to process. Clock and ledger are left untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
    #[error("unknown sender {sender}, cluster has {peer_count} peers")]
    UnknownSender { sender: PeerId, peer_count: usize },
    #[error("message claims to come from this process ({0})")]
    SelfAddressed(PeerId),
    #[error("timestamp {0} leaves the local clock no room to advance")]
    TimestampOverflow(Timestamp),
}
