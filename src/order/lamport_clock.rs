use super::{LogicalClock, Timestamp};

/// Scalar clock following Lamport's happened-before rule.
///
/// Owned by exactly one process; every value it hands out is strictly
/// greater than the previous one. At `Timestamp::MAX` it refuses to move
/// and stays put.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LamportClock(Timestamp);

impl LamportClock {
    pub fn now(&self) -> Timestamp {
        self.0
    }

    // Local event, or originating a message with nothing to merge
    pub fn tick(&mut self) -> Option<Timestamp> {
        *self = self.extend()?;
        Some(self.0)
    }

    // Receipt of a message stamped `seen`
    pub fn advance(&mut self, seen: Timestamp) -> Option<Timestamp> {
        *self = self.merge(&Self(seen))?;
        Some(self.0)
    }
}

impl From<Timestamp> for LamportClock {
    fn from(t: Timestamp) -> Self {
        Self(t)
    }
}

impl LogicalClock for LamportClock {
    fn extend(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
    fn merge(&self, other: &Self) -> Option<Self> {
        self.0.max(other.0).checked_add(1).map(Self)
    }
}
