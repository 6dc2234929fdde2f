use crate::order::Timestamp;
use serde::{Deserialize, Serialize};

use super::{PeerId, ProtocolError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Request = 0,
    Acknowledge = 1,
    Release = 2,
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Request),
            1 => Ok(Self::Acknowledge),
            2 => Ok(Self::Release),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// One protocol message, copied by value across the transport.
///
/// On the wire it is `{"kind": <code>, "sender": <id>, "timestamp": <t>}`;
/// decoding rejects kind codes outside [`MessageKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage", into = "RawMessage")]
pub struct Message {
    pub kind: MessageKind,
    pub sender: PeerId,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn request(sender: PeerId, timestamp: Timestamp) -> Self {
        Self {
            kind: MessageKind::Request,
            sender,
            timestamp,
        }
    }

    pub fn acknowledge(sender: PeerId, timestamp: Timestamp) -> Self {
        Self {
            kind: MessageKind::Acknowledge,
            sender,
            timestamp,
        }
    }

    pub fn release(sender: PeerId, timestamp: Timestamp) -> Self {
        Self {
            kind: MessageKind::Release,
            sender,
            timestamp,
        }
    }

    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }

    /// Position in the (timestamp, sender) total order. Sender only breaks exact ties.
    pub fn priority(&self) -> (Timestamp, PeerId) {
        (self.timestamp, self.sender)
    }
}

#[derive(Serialize, Deserialize)]
struct RawMessage {
    kind: u8,
    sender: PeerId,
    timestamp: Timestamp,
}

impl TryFrom<RawMessage> for Message {
    type Error = ProtocolError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: MessageKind::try_from(raw.kind)?,
            sender: raw.sender,
            timestamp: raw.timestamp,
        })
    }
}

impl From<Message> for RawMessage {
    fn from(msg: Message) -> Self {
        Self {
            kind: msg.kind as u8,
            sender: msg.sender,
            timestamp: msg.timestamp,
        }
    }
}
