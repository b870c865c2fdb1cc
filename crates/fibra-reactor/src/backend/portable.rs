//! `mio`-backed implementation of [`Backend`]: the default, portable
//! reactor (spec.md §4.8).

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use fibra_types::{Direction, Error, ReadinessEvent, TimerId, WatcherId};

use crate::backend::Backend;
use crate::error::ReactorError;
use crate::stream_reactor::WatcherTable;
use crate::timer_wheel::TimerWheel;

pub struct PortableBackend {
    poll: Poll,
    events: Events,
    timers: TimerWheel,
    watchers: WatcherTable,
    by_token: HashMap<Token, WatcherId>,
    registrations: HashMap<WatcherId, (Token, RawFd)>,
    next_token: usize,
}

impl PortableBackend {
    pub fn new() -> Self {
        Self {
            poll: Poll::new().expect("mio::Poll::new should not fail"),
            events: Events::with_capacity(128),
            timers: TimerWheel::new(),
            watchers: WatcherTable::new(),
            by_token: HashMap::new(),
            registrations: HashMap::new(),
            next_token: 0,
        }
    }

    /// Drops both sides of a token's bookkeeping and deregisters its fd
    /// from the `mio` registry, so a later registration of a reused fd
    /// number doesn't hit `EEXIST` against a stale entry.
    fn forget_registration(&mut self, id: WatcherId) {
        if let Some((token, fd)) = self.registrations.remove(&id) {
            self.by_token.remove(&token);
            let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
        }
    }

    fn interest_for(direction: Direction) -> Interest {
        match direction {
            Direction::Read => Interest::READABLE,
            Direction::Write => Interest::WRITABLE,
        }
    }
}

impl Default for PortableBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for PortableBackend {
    fn add_timer(&mut self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        self.timers.add_timer(delay, callback)
    }

    fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel_timer(id)
    }

    fn next_timer_delay(&mut self) -> Option<Duration> {
        self.timers.next_timer_delay()
    }

    fn pop_ready_timers(&mut self) -> Vec<Box<dyn FnOnce()>> {
        self.timers.pop_ready(Instant::now())
    }

    fn add_stream_watcher(
        &mut self,
        fd: RawFd,
        direction: Direction,
        callback: Box<dyn FnMut(ReadinessEvent)>,
    ) -> Result<WatcherId, ReactorError> {
        let token = Token(self.next_token);
        self.next_token += 1;

        self.poll
            .registry()
            .register(&mut SourceFd(&fd), token, Self::interest_for(direction))
            .map_err(|e| ReactorError::RegisterFailed(e.to_string()))?;

        let id = self.watchers.insert(direction, callback);
        self.by_token.insert(token, id);
        self.registrations.insert(id, (token, fd));
        Ok(id)
    }

    fn remove_stream_watcher(&mut self, id: WatcherId) -> bool {
        self.forget_registration(id);
        self.watchers.remove(id)
    }

    fn tick(&mut self, timeout: Duration) -> Result<(), ReactorError> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(ReactorError::PollFailed(e.to_string())),
        }

        let ready: Vec<(Token, bool)> = self
            .events
            .iter()
            .map(|e| {
                (
                    e.token(),
                    e.is_error() || e.is_read_closed() || e.is_write_closed(),
                )
            })
            .collect();

        for (token, errored) in ready {
            let Some(id) = self.by_token.get(&token).copied() else {
                continue;
            };

            let event = if errored {
                ReadinessEvent::Error(Error::backend("stream handle errored"))
            } else {
                ReadinessEvent::Ready
            };
            self.watchers.fire(id, event);

            if errored || self.watchers.direction(id).is_none() {
                self.forget_registration(id);
            }
        }
        Ok(())
    }

    fn has_work(&mut self) -> bool {
        !self.watchers.is_empty() || !self.by_token.is_empty() || !self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_backend_has_no_work() {
        let mut backend = PortableBackend::new();
        assert!(!backend.has_work());
    }

    #[test]
    fn timer_delegates_to_timer_wheel() {
        let mut backend = PortableBackend::new();
        backend.add_timer(Duration::from_secs(60), Box::new(|| ()));
        assert!(backend.next_timer_delay().is_some());
        assert!(backend.has_work());
    }

    #[test]
    fn readable_watcher_fires_when_the_peer_writes() {
        use std::cell::RefCell;
        use std::io::Write;
        use std::os::unix::io::AsRawFd;
        use std::os::unix::net::UnixStream;
        use std::rc::Rc;

        let (mut writer, reader) = UnixStream::pair().expect("socketpair should succeed");
        reader.set_nonblocking(true).expect("set_nonblocking should succeed");

        let mut backend = PortableBackend::new();
        let fired: Rc<RefCell<Option<ReadinessEvent>>> = Rc::new(RefCell::new(None));
        let fired_cb = fired.clone();

        backend
            .add_stream_watcher(
                reader.as_raw_fd(),
                Direction::Read,
                Box::new(move |event| *fired_cb.borrow_mut() = Some(event)),
            )
            .expect("register should succeed");

        writer.write_all(b"x").expect("write should succeed");
        backend
            .tick(Duration::from_secs(1))
            .expect("tick should succeed");

        assert!(matches!(*fired.borrow(), Some(ReadinessEvent::Ready)));
    }

    #[test]
    fn removing_a_watcher_deregisters_its_fd_so_it_can_be_reregistered() {
        use std::os::unix::io::AsRawFd;
        use std::os::unix::net::UnixStream;

        let (_writer, reader) = UnixStream::pair().expect("socketpair should succeed");
        let fd = reader.as_raw_fd();

        let mut backend = PortableBackend::new();
        let id = backend
            .add_stream_watcher(fd, Direction::Read, Box::new(|_| {}))
            .expect("first register should succeed");

        assert!(backend.remove_stream_watcher(id));

        backend
            .add_stream_watcher(fd, Direction::Read, Box::new(|_| {}))
            .expect("re-registering the same fd after removal should not hit EEXIST");
    }
}
