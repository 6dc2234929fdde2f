//! Hotel reservations replicated across servers that share neither memory nor a clock.
//!
//! Bookings are serialized cluster-wide with Lamport's distributed mutual exclusion
//! ([`sync::lamport`]) on top of Lamport clocks ([`order`]), over any FIFO point-to-point
//! [`transport`].

pub mod config;
pub mod hotel;
pub mod order;
pub mod server;
pub mod sync;
pub mod transport;
