use std::time::Instant;

use crate::ids::TimerId;

/// A one-shot timer record.
///
/// Ordering is by `deadline` ascending, ties broken by `insertion_seq`
/// (lower wins), matching the spec's "ties broken by insertion order".
/// Re-scheduling is the callback's own responsibility — firing a timer
/// always removes it first.
pub struct TimerEntry {
    pub id: TimerId,
    pub deadline: Instant,
    pub insertion_seq: u64,
    pub callback: Box<dyn FnOnce()>,
}

impl TimerEntry {
    pub fn new(
        id: TimerId,
        deadline: Instant,
        insertion_seq: u64,
        callback: Box<dyn FnOnce()>,
    ) -> Self {
        Self {
            id,
            deadline,
            insertion_seq,
            callback,
        }
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.insertion_seq == other.insertion_seq
    }
}
impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    /// Reversed so a `BinaryHeap<TimerEntry>` pops the *earliest* deadline
    /// first (`BinaryHeap` is a max-heap by default).
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.insertion_seq.cmp(&self.insertion_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn equal_deadlines_pop_in_insertion_order() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(TimerEntry::new(TimerId::from_raw(2), now, 2, Box::new(|| ())));
        heap.push(TimerEntry::new(TimerId::from_raw(0), now, 0, Box::new(|| ())));
        heap.push(TimerEntry::new(TimerId::from_raw(1), now, 1, Box::new(|| ())));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.insertion_seq)).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
