//! Room inventory. This is what the distributed mutex protects: bookings are only made while
//! holding it, then replicated to every peer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub type RoomId = u32;
pub type Day = u32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub room: RoomId,
    pub client: String,
    pub day: Day,
    pub nights: u32,
}

impl Reservation {
    /// Night before check-out.
    pub fn last_day(&self) -> Day {
        self.day + self.nights - 1
    }

    fn overlaps(&self, day: Day, last_day: Day) -> bool {
        day <= self.last_day() && self.day <= last_day
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomStatus {
    Free,
    /// Booked by the client asking.
    Reserved,
    Occupied,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.write_str("FREE"),
            Self::Reserved => f.write_str("RESERVED"),
            Self::Occupied => f.write_str("OCCUPIED"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("invalid day {0}")]
    InvalidDay(Day),
    #[error("invalid room {0}")]
    InvalidRoom(RoomId),
    #[error("invalid number of nights {0}")]
    InvalidNights(u32),
    #[error("room {room} is already booked from day {day} for {nights} night(s)")]
    AlreadyBooked { room: RoomId, day: Day, nights: u32 },
    #[error("no room available")]
    NoRoomAvailable,
}

#[derive(Debug)]
pub struct Hotel {
    rooms: RoomId,
    days: Day,
    reservations: HashMap<RoomId, Vec<Reservation>>,
}

impl Hotel {
    pub fn new(rooms: RoomId, days: Day) -> Self {
        Self {
            rooms,
            days,
            reservations: HashMap::new(),
        }
    }

    pub fn book_room(
        &mut self,
        room: RoomId,
        day: Day,
        nights: u32,
        client: &str,
    ) -> Result<Reservation, BookingError> {
        let reservation = Reservation {
            room,
            client: client.to_owned(),
            day,
            nights,
        };
        self.apply(reservation.clone())?;
        Ok(reservation)
    }

    /// Installs a reservation, typically one a peer made. Same checks as [`Hotel::book_room`].
    pub fn apply(&mut self, reservation: Reservation) -> Result<(), BookingError> {
        self.validate_day(reservation.day)?;
        self.validate_room(reservation.room)?;
        self.validate_nights(reservation.day, reservation.nights)?;
        let existing = self.conflict(reservation.room, reservation.day, reservation.nights);
        if let Some(existing) = existing {
            return Err(BookingError::AlreadyBooked {
                room: existing.room,
                day: existing.day,
                nights: existing.nights,
            });
        }
        self.reservations
            .entry(reservation.room)
            .or_default()
            .push(reservation);
        Ok(())
    }

    pub fn room_statuses(
        &self,
        day: Day,
        client: &str,
    ) -> Result<Vec<(RoomId, RoomStatus)>, BookingError> {
        self.validate_day(day)?;
        Ok((1..=self.rooms)
            .map(|room| {
                let status = match self.conflict(room, day, 1) {
                    None => RoomStatus::Free,
                    Some(r) if r.client == client => RoomStatus::Reserved,
                    Some(_) => RoomStatus::Occupied,
                };
                (room, status)
            })
            .collect())
    }

    /// Lowest-numbered room free for the whole stay.
    pub fn free_room(&self, day: Day, nights: u32) -> Result<RoomId, BookingError> {
        self.validate_day(day)?;
        self.validate_nights(day, nights)?;
        (1..=self.rooms)
            .find(|&room| self.conflict(room, day, nights).is_none())
            .ok_or(BookingError::NoRoomAvailable)
    }

    fn conflict(&self, room: RoomId, day: Day, nights: u32) -> Option<&Reservation> {
        let last_day = day + nights - 1;
        self.reservations
            .get(&room)?
            .iter()
            .find(|r| r.overlaps(day, last_day))
    }

    fn validate_day(&self, day: Day) -> Result<(), BookingError> {
        if day < 1 || day > self.days {
            return Err(BookingError::InvalidDay(day));
        }
        Ok(())
    }

    fn validate_room(&self, room: RoomId) -> Result<(), BookingError> {
        if room < 1 || room > self.rooms {
            return Err(BookingError::InvalidRoom(room));
        }
        Ok(())
    }

    fn validate_nights(&self, day: Day, nights: u32) -> Result<(), BookingError> {
        if nights < 1 || day.saturating_add(nights - 1) > self.days {
            return Err(BookingError::InvalidNights(nights));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::hotel::{BookingError, Hotel, RoomStatus};

    #[test]
    fn validates_bounds() {
        let mut hotel = Hotel::new(3, 10);
        assert_eq!(hotel.book_room(1, 0, 1, "ann"), Err(BookingError::InvalidDay(0)));
        assert_eq!(hotel.book_room(1, 11, 1, "ann"), Err(BookingError::InvalidDay(11)));
        assert_eq!(hotel.book_room(4, 1, 1, "ann"), Err(BookingError::InvalidRoom(4)));
        assert_eq!(hotel.book_room(1, 1, 0, "ann"), Err(BookingError::InvalidNights(0)));
        // Last night would be day 11
        assert_eq!(hotel.book_room(1, 9, 3, "ann"), Err(BookingError::InvalidNights(3)));
        assert!(hotel.book_room(1, 9, 2, "ann").is_ok());
    }

    #[test]
    fn rejects_overlaps() {
        let mut hotel = Hotel::new(2, 30);
        hotel.book_room(1, 10, 3, "ann").unwrap(); // nights 10, 11, 12

        for (day, nights) in [(8, 3), (12, 1), (11, 5), (9, 10), (10, 3), (11, 1)] {
            assert_eq!(
                hotel.book_room(1, day, nights, "bob"),
                Err(BookingError::AlreadyBooked {
                    room: 1,
                    day: 10,
                    nights: 3
                }),
                "day {day} nights {nights}"
            );
        }
        // Check-out day is free again, as are the days before
        assert!(hotel.book_room(1, 13, 2, "bob").is_ok());
        assert!(hotel.book_room(1, 7, 3, "bob").is_ok());
        // Other rooms are independent
        assert!(hotel.book_room(2, 10, 3, "bob").is_ok());
    }

    #[test]
    fn lists_statuses_per_client() {
        let mut hotel = Hotel::new(3, 30);
        hotel.book_room(1, 5, 2, "ann").unwrap();
        hotel.book_room(3, 6, 1, "bob").unwrap();

        assert_eq!(
            hotel.room_statuses(6, "ann").unwrap(),
            vec![
                (1, RoomStatus::Reserved),
                (2, RoomStatus::Free),
                (3, RoomStatus::Occupied)
            ]
        );
        assert_eq!(
            hotel.room_statuses(7, "bob").unwrap(),
            vec![(1, RoomStatus::Free), (2, RoomStatus::Free), (3, RoomStatus::Free)]
        );
        assert_eq!(hotel.room_statuses(31, "bob"), Err(BookingError::InvalidDay(31)));
    }

    #[test]
    fn finds_free_room() {
        let mut hotel = Hotel::new(2, 30);
        assert_eq!(hotel.free_room(3, 4), Ok(1));
        hotel.book_room(1, 5, 1, "ann").unwrap();
        assert_eq!(hotel.free_room(3, 4), Ok(2));
        hotel.book_room(2, 1, 3, "bob").unwrap();
        assert_eq!(hotel.free_room(3, 4), Err(BookingError::NoRoomAvailable));
        assert_eq!(hotel.free_room(6, 2), Ok(1));
        assert_eq!(hotel.free_room(30, 2), Err(BookingError::InvalidNights(2)));
    }

    #[test]
    fn applies_replicated_reservation() {
        let mut primary = Hotel::new(2, 30);
        let mut replica = Hotel::new(2, 30);
        let reservation = primary.book_room(2, 4, 2, "ann").unwrap();
        replica.apply(reservation.clone()).unwrap();
        assert_eq!(replica.free_room(4, 1), Ok(1));
        assert!(replica.apply(reservation).is_err());
    }
}
