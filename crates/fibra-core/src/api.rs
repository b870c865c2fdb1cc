//! The public surface (spec.md §6): everything a caller reaches for
//! without touching [`EventLoop`]/[`LoopHandle`] directly.

use std::future::Future;
use std::time::Duration;

use fibra_types::{Error, Value};

use crate::config::LoopConfig;
use crate::error::RuntimeError;
use crate::event_loop::EventLoop;
use crate::loop_handle::LoopHandle;
use crate::promise::Promise;

/// Drives a fresh loop to completion of `root`, returning its outcome.
pub fn run<T, F>(root: F) -> Result<T, RuntimeError>
where
    T: Clone + 'static,
    F: Future<Output = Result<T, Error>> + 'static,
{
    run_with_config(LoopConfig::default(), root)
}

pub fn run_with_config<T, F>(config: LoopConfig, root: F) -> Result<T, RuntimeError>
where
    T: Clone + 'static,
    F: Future<Output = Result<T, Error>> + 'static,
{
    let mut event_loop = EventLoop::new(config);
    let (promise, resolver) = Promise::pending();
    event_loop.add_fiber(async move {
        match root.await {
            Ok(v) => {
                resolver.resolve(v);
                Ok(Value::Unit)
            }
            Err(e) => {
                resolver.reject(e.clone());
                Err(e)
            }
        }
    });
    event_loop.run(promise)
}

/// Runs `root`, rejecting the whole run if any input to [`crate::all`]
/// does. Convenience wrapper over [`run`] + [`crate::combinators::all`].
pub fn run_all<T>(promises: Vec<Promise<T>>) -> Result<Vec<T>, RuntimeError>
where
    T: Clone + 'static,
{
    run(async move { crate::combinators::all(promises).await })
}

pub fn run_concurrent<T, F>(tasks: Vec<F>, limit: usize) -> Result<Vec<T>, RuntimeError>
where
    T: Clone + 'static,
    F: FnOnce() -> Promise<T> + 'static,
{
    run(async move { crate::combinators::concurrent(tasks, limit).await })
}

pub fn run_with_timeout<T>(p: Promise<T>, duration: Duration) -> Result<T, RuntimeError>
where
    T: Clone + 'static,
{
    run(async move { crate::combinators::timeout(&p, duration).await })
}

pub fn resolved<T: Clone + 'static>(value: T) -> Promise<T> {
    Promise::resolved(value)
}

pub fn rejected<T: Clone + 'static>(reason: Error) -> Promise<T> {
    Promise::rejected(reason)
}

pub use crate::event_loop::delay;

/// Spawns `future` as a fiber and returns a promise that settles with its
/// outcome — the bridge from "plain async fn" to "tracked, pollable unit
/// of work" that `concurrent`/`batch`/the combinators all consume.
pub fn async_fn<T, F>(future: F) -> Promise<T>
where
    T: Clone + 'static,
    F: Future<Output = Result<T, Error>> + 'static,
{
    let handle = LoopHandle::current();
    let (promise, resolver) = Promise::pending();
    handle.add_fiber(async move {
        match future.await {
            Ok(v) => {
                resolver.resolve(v);
                Ok(Value::Unit)
            }
            Err(e) => {
                resolver.reject(e.clone());
                Err(e)
            }
        }
    });
    promise
}

/// Wraps a blocking closure as a promise, run via
/// [`LoopHandle::submit_external_op`] — the `asyncify` escape hatch for
/// calling synchronous/blocking code from fiber context without stalling
/// the loop.
pub fn asyncify<F>(work: F) -> Promise<Value>
where
    F: FnOnce() -> Result<Value, Error> + Send + 'static,
{
    LoopHandle::current().submit_external_op(work)
}

/// Runs a fallible synchronous closure inline, wrapping its `Result` as
/// an already-settled promise rather than deferring to a fiber or thread —
/// for callers who just want `Result` ergonomics around a value that's
/// already in hand.
pub fn try_async<T, F>(work: F) -> Promise<T>
where
    T: Clone + 'static,
    F: FnOnce() -> Result<T, Error>,
{
    match work() {
        Ok(v) => Promise::resolved(v),
        Err(e) => Promise::rejected(e),
    }
}
