pub mod lamport_clock;

pub use lamport_clock::LamportClock;

pub type Timestamp = u64;

// PartialOrd because not all clocks are comparable
pub trait LogicalClock: PartialOrd + Clone {
    /// Clock of the next local event, `None` once the clock cannot move forward.
    fn extend(&self) -> Option<Self>;
    /// Clock of the event receiving `other`, `None` once the clock cannot move forward.
    fn merge(&self, other: &Self) -> Option<Self>;
}
