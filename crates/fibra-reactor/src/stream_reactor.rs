//! Stream/socket watcher bookkeeping (spec.md §4.7).
//!
//! Read watchers are persistent; write watchers are one-shot and removed
//! immediately after their callback fires once. This table is the shared
//! piece both backend implementations build on top of.

use std::collections::HashMap;
use std::time::Duration;

use fibra_types::watcher::StreamWatcher;
use fibra_types::{Direction, IdAllocator, ReadinessEvent, WatcherId};

#[derive(Default)]
pub struct WatcherTable {
    watchers: HashMap<WatcherId, StreamWatcher>,
    ids: IdAllocator,
}

impl WatcherTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        direction: Direction,
        callback: Box<dyn FnMut(ReadinessEvent)>,
    ) -> WatcherId {
        let id = WatcherId::from_raw(self.ids.next());
        self.watchers
            .insert(id, StreamWatcher::new(id, direction, callback));
        id
    }

    pub fn remove(&mut self, id: WatcherId) -> bool {
        self.watchers.remove(&id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    pub fn direction(&self, id: WatcherId) -> Option<Direction> {
        self.watchers.get(&id).map(|w| w.direction)
    }

    /// Fire `id`'s callback with `event`. One-shot (write) watchers are
    /// removed first so a callback that re-registers sees a clean table.
    pub fn fire(&mut self, id: WatcherId, event: ReadinessEvent) {
        let one_shot = self
            .watchers
            .get(&id)
            .map(|w| !w.is_persistent())
            .unwrap_or(false);

        if one_shot {
            if let Some(mut watcher) = self.watchers.remove(&id) {
                (watcher.callback)(event);
            }
        } else if let Some(watcher) = self.watchers.get_mut(&id) {
            (watcher.callback)(event);
        }
    }
}

/// `min(next_timer_delay, idle_budget)` — the poll-timeout rule every
/// backend's I/O phase uses (spec.md §4.7).
pub fn poll_timeout(next_timer_delay: Option<Duration>, idle_budget: Duration) -> Duration {
    match next_timer_delay {
        Some(d) => d.min(idle_budget),
        None => idle_budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_timeout_uses_the_smaller_bound() {
        assert_eq!(
            poll_timeout(Some(Duration::from_millis(5)), Duration::from_millis(100)),
            Duration::from_millis(5)
        );
        assert_eq!(
            poll_timeout(None, Duration::from_millis(100)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn write_watcher_is_removed_after_firing() {
        let mut table = WatcherTable::new();
        let id = table.insert(Direction::Write, Box::new(|_| {}));
        assert!(!table.is_empty());
        table.fire(id, ReadinessEvent::Ready);
        assert!(table.is_empty());
    }

    #[test]
    fn read_watcher_persists_after_firing() {
        let mut table = WatcherTable::new();
        let id = table.insert(Direction::Read, Box::new(|_| {}));
        table.fire(id, ReadinessEvent::Ready);
        assert!(!table.is_empty());
        assert_eq!(table.direction(id), Some(Direction::Read));
    }
}
