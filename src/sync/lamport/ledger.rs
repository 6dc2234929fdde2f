use super::{Message, PeerId};

/// Last known message from every peer, this process included.
///
/// Sized once to the fixed peer count. Every slot starts as a `Release` stamped 0, which
/// precedes any real request: a peer keeps blocking our grant until we have heard something
/// newer from it.
#[derive(Clone, Debug)]
pub struct RequestLedger {
    self_id: PeerId,
    entries: Vec<Message>,
}

impl RequestLedger {
    pub fn new(self_id: PeerId, peer_count: usize) -> Self {
        assert!(
            self_id < peer_count,
            "Expect 0-based id of process {self_id} < peer_count={peer_count}"
        );
        Self {
            self_id,
            entries: (0..peer_count).map(|p| Message::release(p, 0)).collect(),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, peer: PeerId) -> Option<&Message> {
        self.entries.get(peer)
    }

    pub fn own(&self) -> &Message {
        &self.entries[self.self_id]
    }

    /// Whether this process currently wants the critical section.
    pub fn is_requesting(&self) -> bool {
        self.own().is_request()
    }

    /// Unconditional overwrite. Used for requests and releases.
    pub fn record(&mut self, peer: PeerId, msg: Message) {
        if let Some(slot) = self.entries.get_mut(peer) {
            *slot = msg;
        }
    }

    /// Overwrites unless `peer` has a request on record, which an acknowledge must not hide.
    /// Returns whether the entry changed.
    pub fn record_if_not_requesting(&mut self, peer: PeerId, msg: Message) -> bool {
        match self.entries.get_mut(peer) {
            Some(slot) if !slot.is_request() => {
                *slot = msg;
                true
            }
            _ => false,
        }
    }

    pub fn others(&self) -> impl Iterator<Item = (PeerId, &Message)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(peer, _)| *peer != self.self_id)
    }

    /// Our own request is strictly first in (timestamp, id) order among all entries.
    pub fn own_request_is_oldest(&self) -> bool {
        if !self.is_requesting() {
            return false;
        }
        let own = self.own().priority();
        self.others().all(|(_, msg)| own < msg.priority())
    }
}

#[cfg(test)]
mod tests {
    use crate::sync::lamport::{ledger::RequestLedger, Message};

    #[test]
    fn fresh_ledger_blocks_until_heard_from() {
        let mut ledger = RequestLedger::new(1, 3);
        assert!(!ledger.is_requesting());
        assert!(!ledger.own_request_is_oldest());

        ledger.record(1, Message::request(1, 1));
        assert!(ledger.is_requesting());
        // Peers 0 and 2 still sit at their initial Release@0
        assert!(!ledger.own_request_is_oldest());

        ledger.record_if_not_requesting(0, Message::acknowledge(0, 3));
        assert!(!ledger.own_request_is_oldest());
        ledger.record_if_not_requesting(2, Message::acknowledge(2, 3));
        assert!(ledger.own_request_is_oldest());
    }

    #[test]
    fn single_process_is_vacuously_oldest() {
        let mut ledger = RequestLedger::new(0, 1);
        ledger.record(0, Message::request(0, 1));
        assert_eq!(ledger.others().count(), 0);
        assert!(ledger.own_request_is_oldest());
    }

    #[test]
    fn acknowledge_does_not_hide_request() {
        let mut ledger = RequestLedger::new(0, 2);
        ledger.record(1, Message::request(1, 8));
        assert!(!ledger.record_if_not_requesting(1, Message::acknowledge(1, 6)));
        assert!(!ledger.record_if_not_requesting(1, Message::acknowledge(1, 8)));
        assert_eq!(ledger.get(1), Some(&Message::request(1, 8)));

        // Release retires the request, after which acknowledges land again
        ledger.record(1, Message::release(1, 9));
        assert!(ledger.record_if_not_requesting(1, Message::acknowledge(1, 12)));
        assert_eq!(ledger.get(1), Some(&Message::acknowledge(1, 12)));
    }

    #[test]
    fn ties_go_to_lower_id() {
        let mut low = RequestLedger::new(1, 3);
        low.record(0, Message::acknowledge(0, 9));
        low.record(1, Message::request(1, 5));
        low.record(2, Message::request(2, 5));
        assert!(low.own_request_is_oldest());

        let mut high = RequestLedger::new(2, 3);
        high.record(0, Message::acknowledge(0, 9));
        high.record(1, Message::request(1, 5));
        high.record(2, Message::request(2, 5));
        assert!(!high.own_request_is_oldest());
    }

    #[test]
    fn release_unblocks_waiter() {
        let mut ledger = RequestLedger::new(0, 3);
        ledger.record(0, Message::request(0, 7));
        ledger.record(1, Message::acknowledge(1, 9));
        ledger.record(2, Message::request(2, 4));
        assert!(!ledger.own_request_is_oldest());

        ledger.record(2, Message::release(2, 11));
        assert!(ledger.own_request_is_oldest());
    }

    #[test]
    fn unknown_peer_is_ignored() {
        let mut ledger = RequestLedger::new(0, 2);
        ledger.record(5, Message::request(5, 1));
        assert!(!ledger.record_if_not_requesting(5, Message::acknowledge(5, 1)));
        assert_eq!(ledger.get(5), None);
        assert_eq!(ledger.peer_count(), 2);
    }
}
