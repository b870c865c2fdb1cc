//! Pluggable I/O + timer backend (spec.md §4.8).
//!
//! `add_timer`/`cancel_timer`/`next_timer_delay`/`pop_ready_timers` back the
//! loop's own Timers phase (phase 3, run by the caller); `tick` is the I/O
//! reactor poll (phase 5) and is the only method allowed to block.

pub mod portable;

#[cfg(all(unix, feature = "highperf"))]
pub mod highperf;

pub use portable::PortableBackend;

#[cfg(all(unix, feature = "highperf"))]
pub use highperf::TokioBackend;

use std::os::fd::RawFd;
use std::time::Duration;

use fibra_types::{Direction, ReadinessEvent, TimerId, WatcherId};

use crate::error::ReactorError;

pub trait Backend {
    fn add_timer(&mut self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;
    fn cancel_timer(&mut self, id: TimerId) -> bool;
    fn next_timer_delay(&mut self) -> Option<Duration>;
    fn pop_ready_timers(&mut self) -> Vec<Box<dyn FnOnce()>>;

    fn add_stream_watcher(
        &mut self,
        fd: RawFd,
        direction: Direction,
        callback: Box<dyn FnMut(ReadinessEvent)>,
    ) -> Result<WatcherId, ReactorError>;
    fn remove_stream_watcher(&mut self, id: WatcherId) -> bool;

    /// Poll for I/O readiness, blocking up to `timeout`. Dispatches any
    /// ready watcher callbacks before returning.
    fn tick(&mut self, timeout: Duration) -> Result<(), ReactorError>;

    fn has_work(&mut self) -> bool;
}

/// Configuration driving backend selection (the `LoopConfig` builder's
/// `prefer_high_perf_backend` field).
#[derive(Clone, Copy, Debug, Default)]
pub struct BackendConfig {
    pub prefer_high_perf_backend: bool,
}

/// Picks [`TokioBackend`] when the `highperf` feature is compiled in and
/// requested; falls back to [`PortableBackend`] otherwise.
pub fn detect(config: BackendConfig) -> Box<dyn Backend> {
    #[cfg(all(unix, feature = "highperf"))]
    {
        if config.prefer_high_perf_backend {
            return Box::new(TokioBackend::new());
        }
    }
    let _ = config;
    Box::new(PortableBackend::new())
}
