pub mod deferred;
pub mod error;
pub mod fiber_state;
pub mod ids;
pub mod promise_state;
pub mod socket;
pub mod timer;
pub mod value;
pub mod watcher;

pub use deferred::{DeferredTask, Scope};
pub use error::{Error, ErrorKind};
pub use fiber_state::FiberState;
pub use ids::{ExternalOpId, FiberId, IdAllocator, TimerId, WatcherId};
pub use promise_state::PromiseState;
pub use socket::Socket;
pub use timer::TimerEntry;
pub use value::Value;
pub use watcher::{Direction, ReadinessEvent, StreamWatcher};
