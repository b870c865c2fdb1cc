//! I/O reactor: timer wheel, stream/socket watcher bookkeeping, and the
//! pluggable backend abstraction that drives both.

pub mod backend;
pub mod error;
pub mod stream_reactor;
pub mod timer_wheel;

pub use backend::{Backend, BackendConfig, PortableBackend};
#[cfg(all(unix, feature = "highperf"))]
pub use backend::TokioBackend;
pub use error::ReactorError;
pub use stream_reactor::{poll_timeout, WatcherTable};
pub use timer_wheel::TimerWheel;
