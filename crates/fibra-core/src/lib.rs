//! Orchestration layer: the event loop, fiber scheduler, await bridge,
//! promise implementation, combinators, and public API (spec.md §4).

mod await_bridge;
mod combinators;
mod config;
mod error;
mod event_loop;
mod external_ops;
mod fiber_scheduler;
mod loop_handle;
mod promise;

pub mod api;

pub use await_bridge::await_promise;
pub use combinators::{all, any, batch, concurrent, race, timeout};
pub use config::LoopConfig;
pub use error::RuntimeError;
pub use event_loop::{delay, EventLoop};
pub use external_ops::{BlockingOpDriver, ExternalCompletion, ExternalOpDriver};
pub use fibra_types::Scope;
pub use loop_handle::LoopHandle;
pub use promise::{Promise, PromiseResolver};

#[cfg(test)]
mod e2e;
