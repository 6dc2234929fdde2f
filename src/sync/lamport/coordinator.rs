use super::{Message, MessageKind, PeerId, ProtocolError, RequestLedger};
use crate::order::{LamportClock, Timestamp};
use crate::sync::Mutex;
use crate::transport::{Transport, TransportError};
use parking_lot::{Condvar, Mutex as StateLock};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("peer id {self_id} out of range for a cluster of {peer_count}")]
    InvalidConfig { self_id: PeerId, peer_count: usize },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("a request for the critical section is already pending")]
    AlreadyRequesting,
    #[error("not in the critical section")]
    NotHolding,
    #[error("logical clock exhausted")]
    ClockExhausted,
}

/// Where this process stands with respect to its own request slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutexState {
    Idle,
    Requesting,
    InCriticalSection,
}

struct ProtocolState {
    clock: LamportClock,
    ledger: RequestLedger,
    granted: bool,
}

impl ProtocolState {
    fn mutex_state(&self) -> MutexState {
        match (self.ledger.is_requesting(), self.granted) {
            (_, true) => MutexState::InCriticalSection,
            (true, false) => MutexState::Requesting,
            (false, false) => MutexState::Idle,
        }
    }
}

/// One process's side of the distributed mutex.
///
/// Clock, ledger and grant flag live behind a single lock; every handler runs start to finish
/// under it, outbound messages included, so sends to any one peer leave in the order the state
/// changes happened. [`Mutex::acquire`] waits on a condition variable and gives the lock up
/// while it waits, which is what lets incoming messages grant it.
pub struct MutexCoordinator<T> {
    self_id: PeerId,
    peer_count: usize,
    transport: T,
    state: StateLock<ProtocolState>,
    grant: Condvar,
}

impl<T> MutexCoordinator<T>
where
    T: Transport<Message>,
{
    pub fn new(self_id: PeerId, peer_count: usize, transport: T) -> Result<Self, CoordinatorError> {
        if self_id >= peer_count {
            return Err(CoordinatorError::InvalidConfig {
                self_id,
                peer_count,
            });
        }
        Ok(Self {
            self_id,
            peer_count,
            transport,
            state: StateLock::new(ProtocolState {
                clock: LamportClock::default(),
                ledger: RequestLedger::new(self_id, peer_count),
                granted: false,
            }),
            grant: Condvar::new(),
        })
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> MutexState {
        self.state.lock().mutex_state()
    }

    pub fn clock(&self) -> Timestamp {
        self.state.lock().clock.now()
    }

    /// Last message on record for `peer`.
    pub fn entry(&self, peer: PeerId) -> Option<Message> {
        self.state.lock().ledger.get(peer).copied()
    }

    /// Entry point for the transport: applies one message from a peer.
    ///
    /// Invalid messages are rejected before anything is touched. A transport error here means
    /// the acknowledge could not be sent; the message itself has been applied.
    pub fn on_message(&self, msg: Message) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        let (clock, reply) = match self.validate(&msg).and_then(|()| self.step(&state, &msg)) {
            Ok(step) => step,
            Err(error) => {
                warn!(peer = self.self_id, %error, ?msg, "rejecting message");
                return Err(error.into());
            }
        };

        state.clock = clock;
        match msg.kind {
            MessageKind::Request | MessageKind::Release => state.ledger.record(msg.sender, msg),
            MessageKind::Acknowledge => {
                state.ledger.record_if_not_requesting(msg.sender, msg);
            }
        }

        let sent = match reply {
            Some(ack) => self.transport.send(msg.sender, ack),
            None => Ok(()),
        };
        self.verify(&mut state);
        sent.map_err(CoordinatorError::from)
    }

    /// Stamps and broadcasts a request without waiting for the grant.
    #[cfg(test)]
    pub(crate) fn request(&self) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        self.request_locked(&mut state)
    }

    fn validate(&self, msg: &Message) -> Result<(), ProtocolError> {
        if msg.sender >= self.peer_count {
            return Err(ProtocolError::UnknownSender {
                sender: msg.sender,
                peer_count: self.peer_count,
            });
        }
        if msg.sender == self.self_id {
            return Err(ProtocolError::SelfAddressed(msg.sender));
        }
        if msg.timestamp == Timestamp::MAX {
            return Err(ProtocolError::TimestampOverflow(msg.timestamp));
        }
        Ok(())
    }

    // Clock after receiving `msg`, and the acknowledge it calls for. Nothing is committed here,
    // so a timestamp the clock cannot absorb leaves the state as it was.
    fn step(
        &self,
        state: &ProtocolState,
        msg: &Message,
    ) -> Result<(LamportClock, Option<Message>), ProtocolError> {
        let overflow = || ProtocolError::TimestampOverflow(msg.timestamp);
        let mut clock = state.clock;
        clock.advance(msg.timestamp).ok_or_else(overflow)?;
        // Requesting processes stay silent, the ledger comparison does the deferring
        let reply = if msg.is_request() && !state.ledger.is_requesting() {
            let timestamp = clock.tick().ok_or_else(overflow)?;
            Some(Message::acknowledge(self.self_id, timestamp))
        } else {
            None
        };
        Ok((clock, reply))
    }

    fn request_locked(&self, state: &mut ProtocolState) -> Result<(), CoordinatorError> {
        if state.ledger.is_requesting() {
            return Err(CoordinatorError::AlreadyRequesting);
        }
        let timestamp = state.clock.tick().ok_or(CoordinatorError::ClockExhausted)?;
        let request = Message::request(self.self_id, timestamp);
        state.ledger.record(self.self_id, request);
        debug!(peer = self.self_id, timestamp, "requesting critical section");

        if let Err(error) = self.broadcast(request) {
            // Peers that did get the request must see it retired
            warn!(peer = self.self_id, %error, "request broadcast failed, withdrawing");
            self.withdraw(state);
            return Err(error.into());
        }
        self.verify(state);
        Ok(())
    }

    fn withdraw(&self, state: &mut ProtocolState) {
        let release = Message::release(self.self_id, self.release_stamp(state));
        state.ledger.record(self.self_id, release);
        state.granted = false;
        if let Err(error) = self.broadcast(release) {
            warn!(peer = self.self_id, %error, "withdrawal did not reach every peer");
        }
    }

    // A release only has to retire our request, so a clock at its limit reuses its last value
    fn release_stamp(&self, state: &mut ProtocolState) -> Timestamp {
        state.clock.tick().unwrap_or_else(|| {
            warn!(peer = self.self_id, "logical clock exhausted, releasing at its last value");
            state.clock.now()
        })
    }

    // Every peer is attempted; the first failure is reported
    fn broadcast(&self, msg: Message) -> Result<(), TransportError> {
        let mut result = Ok(());
        for peer in (0..self.peer_count).filter(|&p| p != self.self_id) {
            if let Err(error) = self.transport.send(peer, msg) {
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    // Monotone: only ever turns the grant on. `release` is the one place it goes off.
    fn verify(&self, state: &mut ProtocolState) {
        if !state.granted && state.ledger.own_request_is_oldest() {
            state.granted = true;
            debug!(
                peer = self.self_id,
                timestamp = state.ledger.own().timestamp,
                "entering critical section"
            );
            self.grant.notify_all();
        }
        debug_assert!(
            !state.granted || state.ledger.is_requesting(),
            "granted without a pending request"
        );
    }
}

impl<T> Mutex for MutexCoordinator<T>
where
    T: Transport<Message>,
{
    type Error = CoordinatorError;

    fn acquire(&self) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        self.request_locked(&mut state)?;
        while !state.granted {
            self.grant.wait(&mut state);
        }
        Ok(())
    }

    fn release(&self) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        if !state.granted {
            return Err(CoordinatorError::NotHolding);
        }
        let timestamp = self.release_stamp(&mut state);
        let release = Message::release(self.self_id, timestamp);
        state.ledger.record(self.self_id, release);
        state.granted = false;
        debug!(peer = self.self_id, timestamp, "leaving critical section");
        self.broadcast(release)?;
        Ok(())
    }
}
