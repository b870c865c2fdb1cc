use crate::error::Error;
use crate::ids::WatcherId;

/// Readiness direction a [`StreamWatcher`] is registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

/// Outcome delivered to a watcher callback when its handle becomes ready.
#[derive(Debug)]
pub enum ReadinessEvent {
    Ready,
    Error(Error),
}

/// A stream/socket readiness registration.
///
/// Read watchers are persistent (removed only via
/// `remove_stream_watcher`); write watchers are one-shot and removed
/// immediately after the reactor fires their callback once.
pub struct StreamWatcher {
    pub id: WatcherId,
    pub direction: Direction,
    pub callback: Box<dyn FnMut(ReadinessEvent)>,
}

impl StreamWatcher {
    pub fn new(
        id: WatcherId,
        direction: Direction,
        callback: Box<dyn FnMut(ReadinessEvent)>,
    ) -> Self {
        Self {
            id,
            direction,
            callback,
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.direction, Direction::Read)
    }
}
