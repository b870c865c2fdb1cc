//! Optional high-performance backend (spec.md §4.8, feature `highperf`,
//! Unix-only): delegates stream readiness to `tokio::io::unix::AsyncFd`,
//! both driven from a small current-thread runtime owned by the backend.
//! When this backend is active, the loop's own idle-sleep computation is
//! folded into `tick`'s `block_on` call.

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use tokio::io::unix::AsyncFd;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use fibra_types::{Direction, ReadinessEvent, TimerId, WatcherId};

use crate::backend::Backend;
use crate::error::ReactorError;
use crate::stream_reactor::WatcherTable;
use crate::timer_wheel::TimerWheel;

pub struct TokioBackend {
    runtime: Runtime,
    timers: TimerWheel,
    watchers: WatcherTable,
    handles: HashMap<WatcherId, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<WatcherId>,
    rx: mpsc::UnboundedReceiver<WatcherId>,
}

impl TokioBackend {
    pub fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("current-thread tokio runtime should build");
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            timers: TimerWheel::new(),
            watchers: WatcherTable::new(),
            handles: HashMap::new(),
            tx,
            rx,
        }
    }
}

impl Default for TokioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for TokioBackend {
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
        let id = self.watchers.insert(direction, callback);

        let async_fd = self
            .runtime
            .block_on(async { AsyncFd::new(fd) })
            .map_err(|e| ReactorError::RegisterFailed(e.to_string()))?;

        let persistent = matches!(direction, Direction::Read);
        let tx = self.tx.clone();

        let handle = self.runtime.spawn(async move {
            loop {
                let ready = match direction {
                    Direction::Read => async_fd.readable().await,
                    Direction::Write => async_fd.writable().await,
                };
                match ready {
                    Ok(mut guard) => {
                        guard.clear_ready();
                        if tx.send(id).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
                if !persistent {
                    break;
                }
            }
        });

        self.handles.insert(id, handle);
        Ok(id)
    }

    fn remove_stream_watcher(&mut self, id: WatcherId) -> bool {
        if let Some(handle) = self.handles.remove(&id) {
            handle.abort();
        }
        self.watchers.remove(id)
    }

    fn tick(&mut self, timeout: Duration) -> Result<(), ReactorError> {
        let fired = self.runtime.block_on(async {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => None,
                id = self.rx.recv() => id,
            }
        });

        if let Some(id) = fired {
            self.watchers.fire(id, ReadinessEvent::Ready);
            self.handles.remove(&id);
        }
        Ok(())
    }

    fn has_work(&mut self) -> bool {
        !self.watchers.is_empty() || !self.handles.is_empty() || !self.timers.is_empty()
    }
}
