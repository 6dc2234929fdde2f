pub mod client;
pub mod command;

use crate::hotel::{BookingError, Day, Hotel, Reservation, RoomId, RoomStatus};
use crate::sync::lamport::{CoordinatorError, Message, MutexCoordinator, PeerId};
use crate::sync::Mutex;
use crate::transport::{tcp::Inbound, Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Everything exchanged between hotel servers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    Lamport(Message),
    Booking(Reservation),
}

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        Self::Lamport(msg)
    }
}

impl From<Reservation> for Frame {
    fn from(reservation: Reservation) -> Self {
        Self::Booking(reservation)
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error("message from peer {claimed} arrived on the link from peer {link}")]
    SenderMismatch { link: PeerId, claimed: PeerId },
}

/// One hotel server: a local replica of the inventory plus its side of the distributed mutex.
pub struct HotelNode<T> {
    coordinator: MutexCoordinator<T>,
    hotel: parking_lot::Mutex<Hotel>,
    // Local bookers take turns before asking the cluster
    booking_turn: parking_lot::Mutex<()>,
}

impl<T> HotelNode<T>
where
    T: Transport<Message> + Transport<Reservation>,
{
    pub fn new(
        self_id: PeerId,
        peer_count: usize,
        hotel: Hotel,
        transport: T,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            coordinator: MutexCoordinator::new(self_id, peer_count, transport)?,
            hotel: parking_lot::Mutex::new(hotel),
            booking_turn: parking_lot::Mutex::new(()),
        })
    }

    pub fn coordinator(&self) -> &MutexCoordinator<T> {
        &self.coordinator
    }

    /// Books under the distributed mutex and replicates before releasing it.
    ///
    /// Blocks until the cluster grants the critical section.
    pub fn book(
        &self,
        room: RoomId,
        day: Day,
        nights: u32,
        client: &str,
    ) -> Result<Reservation, NodeError> {
        let _turn = self.booking_turn.lock();
        let guard = self.coordinator.lock()?;

        let reservation = self.hotel.lock().book_room(room, day, nights, client)?;
        let peer = self.coordinator.self_id();
        info!(peer, room, day, nights, client, "room booked");

        // Committed locally: from here on the client gets its reservation and link failures
        // are only logged. FIFO links make every peer apply this before it sees our release.
        if let Err(error) = self.replicate(&reservation) {
            warn!(peer, room, day, %error, "booking did not reach every peer");
        }
        if let Err(error) = guard.unlock() {
            warn!(peer, %error, "release did not reach every peer");
        }
        Ok(reservation)
    }

    pub fn room_statuses(
        &self,
        day: Day,
        client: &str,
    ) -> Result<Vec<(RoomId, RoomStatus)>, NodeError> {
        Ok(self.hotel.lock().room_statuses(day, client)?)
    }

    pub fn free_room(&self, day: Day, nights: u32) -> Result<RoomId, NodeError> {
        Ok(self.hotel.lock().free_room(day, nights)?)
    }

    /// Applies one frame received from `from`. Never blocks on the distributed mutex.
    pub fn dispatch(&self, from: PeerId, frame: Frame) -> Result<(), NodeError> {
        match frame {
            Frame::Lamport(msg) => {
                if msg.sender != from {
                    return Err(NodeError::SenderMismatch {
                        link: from,
                        claimed: msg.sender,
                    });
                }
                self.coordinator.on_message(msg)?;
            }
            Frame::Booking(reservation) => {
                debug!(
                    peer = from,
                    room = reservation.room,
                    day = reservation.day,
                    "replicated booking"
                );
                self.hotel.lock().apply(reservation)?;
            }
        }
        Ok(())
    }

    // Every peer is attempted; the first failure is reported
    fn replicate(&self, reservation: &Reservation) -> Result<(), TransportError> {
        let self_id = self.coordinator.self_id();
        let transport = self.coordinator.transport();
        let mut result = Ok(());
        for peer in (0..self.coordinator.peer_count()).filter(|&p| p != self_id) {
            let sent = Transport::<Reservation>::send(transport, peer, reservation.clone());
            if let Err(error) = sent {
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }
}

/// Feeds frames from the network into `node` until the transport shuts down.
pub fn spawn_dispatcher<T>(
    node: Arc<HotelNode<T>>,
    mut inbound: Inbound<Frame>,
) -> tokio::task::JoinHandle<()>
where
    T: Transport<Message> + Transport<Reservation> + 'static,
{
    tokio::spawn(async move {
        while let Some((from, frame)) = inbound.recv().await {
            if let Err(error) = node.dispatch(from, frame) {
                warn!(peer = from, %error, "dropping frame");
            }
        }
    })
}
