//! Timer wheel (spec.md §4.6): a keyed map plus a min-structure over
//! deadlines.
//!
//! Backed by a `BinaryHeap<TimerEntry>` (min-heap over deadline via the
//! reversed `Ord` impl on `TimerEntry`) for O(log n) "what fires next",
//! plus a tombstone set for O(1) cancellation: cancelling doesn't touch
//! the heap directly (removing an arbitrary heap element is O(n)); it
//! just marks the id cancelled, and `pop_ready`/`next_deadline` skip
//! tombstoned entries lazily as they're popped.

use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

use fibra_types::{IdAllocator, TimerId};
use fibra_types::timer::TimerEntry;

#[derive(Default)]
pub struct TimerWheel {
    heap: BinaryHeap<TimerEntry>,
    cancelled: HashSet<TimerId>,
    ids: IdAllocator,
    insertion_seq: u64,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_timer(&mut self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = TimerId::from_raw(self.ids.next());
        let seq = self.insertion_seq;
        self.insertion_seq += 1;
        let deadline = Instant::now() + delay;
        self.heap
            .push(TimerEntry::new(id, deadline, seq, callback));
        id
    }

    /// Cancellation is a tombstone insert: O(1). Returns `false` if `id`
    /// was already cancelled or never existed (best-effort — we don't scan
    /// the heap to confirm membership, matching "O(log n) or O(1)
    /// depending on chosen structure; both are acceptable").
    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.cancelled.insert(id)
    }

    /// `max(0, min_deadline - now)`, or `None` if the wheel is empty of
    /// live (non-cancelled) timers.
    pub fn next_timer_delay(&mut self) -> Option<Duration> {
        self.drop_cancelled_heads();
        self.heap.peek().map(|entry| {
            let now = Instant::now();
            entry.deadline.saturating_duration_since(now)
        })
    }

    /// Pop and return every timer whose deadline has passed, in deadline
    /// order (ties by insertion order). Each entry is removed from the
    /// wheel before its callback runs (callback re-scheduling is its own
    /// responsibility).
    pub fn pop_ready(&mut self, now: Instant) -> Vec<Box<dyn FnOnce()>> {
        let mut ready = Vec::new();
        loop {
            self.drop_cancelled_heads();
            match self.heap.peek() {
                Some(entry) if entry.deadline <= now => {
                    let entry = self.heap.pop().expect("peeked Some");
                    ready.push(entry.callback);
                }
                _ => break,
            }
        }
        ready
    }

    pub fn is_empty(&mut self) -> bool {
        self.drop_cancelled_heads();
        self.heap.is_empty()
    }

    fn drop_cancelled_heads(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.cancelled.remove(&entry.id) {
                self.heap.pop();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn pop_ready_fires_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        wheel.add_timer(Duration::from_millis(20), Box::new(move || o1.lock().unwrap().push(1)));
        let o2 = order.clone();
        wheel.add_timer(Duration::from_millis(5), Box::new(move || o2.lock().unwrap().push(2)));
        let o3 = order.clone();
        wheel.add_timer(Duration::from_millis(10), Box::new(move || o3.lock().unwrap().push(3)));

        std::thread::sleep(Duration::from_millis(25));
        let ready = wheel.pop_ready(Instant::now());
        for cb in ready {
            cb();
        }

        assert_eq!(*order.lock().unwrap(), vec![2, 3, 1]);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut wheel = TimerWheel::new();
        let fired = Arc::new(Mutex::new(false));
        let f = fired.clone();
        let id = wheel.add_timer(Duration::from_millis(1), Box::new(move || *f.lock().unwrap() = true));

        assert!(wheel.cancel_timer(id));

        std::thread::sleep(Duration::from_millis(5));
        let ready = wheel.pop_ready(Instant::now());
        assert!(ready.is_empty());
        assert!(!*fired.lock().unwrap());
    }

    #[test]
    fn next_timer_delay_is_none_when_empty() {
        let mut wheel = TimerWheel::new();
        assert_eq!(wheel.next_timer_delay(), None);
    }
}
