//! Earliest-deadline-first index over arena handles with finite TTLs.
//!
//! Ordered by `(deadline_nanos, sequence)` so that entries expiring at the
//! same instant drain in insertion order (FIFO tiebreak), mirroring the
//! ordering `Stamped` keys give the expiring-cache variants this is modeled
//! on, but without needing to re-borrow the key itself: the arena handle is
//! enough to identify an entry uniquely.

use std::collections::BTreeMap;

/// `(deadline_nanos, insertion_sequence)`. Deadline orders first; sequence
/// breaks ties between entries sharing a deadline.
pub(crate) type Deadline = (u64, u64);

#[derive(Debug, Default)]
pub(crate) struct TtlIndex {
    by_deadline: BTreeMap<Deadline, usize>,
    next_seq: u64,
}

impl TtlIndex {
    pub(crate) fn new() -> Self {
        TtlIndex { by_deadline: BTreeMap::new(), next_seq: 0 }
    }

    /// Allocates the next insertion sequence number, for tie-breaking entries
    /// that share a deadline.
    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    pub(crate) fn insert(&mut self, deadline: Deadline, handle: usize) {
        self.by_deadline.insert(deadline, handle);
    }

    pub(crate) fn remove(&mut self, deadline: &Deadline) {
        self.by_deadline.remove(deadline);
    }

    /// The handle with the earliest deadline, if any, along with that
    /// deadline's nanosecond reading.
    pub(crate) fn peek_earliest(&self) -> Option<(Deadline, usize)> {
        self.by_deadline.iter().next().map(|(&d, &h)| (d, h))
    }

    pub(crate) fn clear(&mut self) {
        self.by_deadline.clear();
        self.next_seq = 0;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_deadline.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_deadline_wins() {
        let mut idx = TtlIndex::new();
        idx.insert((200, 0), 1);
        idx.insert((100, 1), 2);
        idx.insert((300, 2), 3);
        assert_eq!(idx.peek_earliest(), Some(((100, 1), 2)));
    }

    #[test]
    fn same_deadline_breaks_tie_by_sequence() {
        let mut idx = TtlIndex::new();
        let a = idx.next_seq();
        idx.insert((50, a), 10);
        let b = idx.next_seq();
        idx.insert((50, b), 20);
        assert_eq!(idx.peek_earliest(), Some(((50, a), 10)));
    }

    #[test]
    fn remove_drops_entry() {
        let mut idx = TtlIndex::new();
        idx.insert((10, 0), 1);
        idx.remove(&(10, 0));
        assert_eq!(idx.peek_earliest(), None);
        assert_eq!(idx.len(), 0);
    }

    #[test]
    fn clear_resets_sequence() {
        let mut idx = TtlIndex::new();
        idx.next_seq();
        idx.next_seq();
        idx.clear();
        assert_eq!(idx.next_seq(), 0);
    }
}
