//! The event loop (spec.md §4.1): six phases per iteration, fixed order,
//! run until the driving promise settles or nothing is left to do.

use std::time::Duration;

use fibra_reactor::backend;
use fibra_types::{Error, FiberId, IdAllocator, TimerId, Value};
use tokio::sync::mpsc;

use crate::config::LoopConfig;
use crate::error::RuntimeError;
use crate::external_ops::ExternalCompletion;
use crate::fiber_scheduler::FiberScheduler;
use crate::loop_handle::{LoopCore, LoopHandle};
use crate::promise::Promise;

pub struct EventLoop {
    handle: LoopHandle,
    config: LoopConfig,
    external_rx: mpsc::UnboundedReceiver<ExternalCompletion>,
    blocking_rt: tokio::runtime::Runtime,
}

impl EventLoop {
    pub fn new(config: LoopConfig) -> Self {
        let blocking_rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("blocking-op runtime should build");

        let (external_tx, external_rx) = mpsc::unbounded_channel();

        let core = std::rc::Rc::new(std::cell::RefCell::new(LoopCore {
            next_tick: Default::default(),
            deferred: Default::default(),
            on_global: Vec::new(),
            on_terminate: Vec::new(),
            fibers: FiberScheduler::new(),
            external_ids: IdAllocator::new(),
            pending_external_ops: Default::default(),
            external_tx,
            blocking_rt: blocking_rt.handle().clone(),
            backend: backend::detect(config.backend_config()),
        }));

        Self {
            handle: LoopHandle { core },
            config,
            external_rx,
            blocking_rt,
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn add_timer(&mut self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        self.handle.add_timer(delay, callback)
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.handle.cancel_timer(id)
    }

    pub fn add_fiber<F>(&mut self, future: F) -> FiberId
    where
        F: std::future::Future<Output = Result<Value, Error>> + 'static,
    {
        self.handle.add_fiber(future)
    }

    /// Drives the loop until `root` settles, running the six phases in
    /// fixed order each iteration: NextTick -> Deferred -> Timers ->
    /// External completions -> I/O reactor -> Fiber tick.
    pub fn run<T: Clone + 'static>(&mut self, root: Promise<T>) -> Result<T, RuntimeError> {
        let _guard = LoopHandle::install(self.handle.clone());

        loop {
            if let Some(result) = root.peek() {
                self.run_shutdown_callbacks();
                return result.map_err(RuntimeError::from);
            }

            self.phase_next_tick();
            self.phase_deferred();
            self.phase_timers();
            self.phase_external_completions();

            if let Some(result) = root.peek() {
                self.run_shutdown_callbacks();
                return result.map_err(RuntimeError::from);
            }

            self.phase_io(root.clone());
            self.phase_fiber_tick();

            if !self.has_work() {
                self.run_shutdown_callbacks();
                return Err(RuntimeError::Deadlocked);
            }
        }
    }

    /// Unlike the other phases, this one isn't a fixed pre-collected batch:
    /// a callback enqueued mid-drain (e.g. a `.then()` continuation that
    /// settles another promise) runs within the same drain rather than
    /// waiting for the next iteration's phase 1.
    fn phase_next_tick(&mut self) {
        let mut count = 0;
        loop {
            let next = self.handle.core.borrow_mut().next_tick.pop_front();
            let Some(cb) = next else { break };
            count += 1;
            cb();
        }
        tracing::trace!(count, "event_loop.phase = \"next_tick\"");
    }

    fn phase_deferred(&mut self) {
        let batch: Vec<_> = self.handle.core.borrow_mut().deferred.drain(..).collect();
        tracing::trace!(count = batch.len(), "event_loop.phase = \"deferred\"");
        for cb in batch {
            cb();
        }
    }

    fn phase_timers(&mut self) {
        let ready = self.handle.core.borrow_mut().backend.pop_ready_timers();
        tracing::trace!(count = ready.len(), "event_loop.phase = \"timers\"");
        for cb in ready {
            cb();
        }
    }

    fn phase_external_completions(&mut self) {
        let mut count = 0;
        while let Ok(completion) = self.external_rx.try_recv() {
            count += 1;
            let resolver = self
                .handle
                .core
                .borrow_mut()
                .pending_external_ops
                .remove(&completion.id);
            if let Some(resolver) = resolver {
                match completion.result {
                    Ok(v) => resolver.resolve(v),
                    Err(e) => resolver.reject(e),
                }
            }
        }
        tracing::trace!(count, "event_loop.phase = \"external_completions\"");
    }

    fn phase_io<T: Clone + 'static>(&mut self, root: Promise<T>) {
        let _ = root;
        let mut core = self.handle.core.borrow_mut();
        let timeout = fibra_reactor::poll_timeout(
            core.backend.next_timer_delay(),
            self.config.idle_budget().max(self.config.default_io_timeout()),
        );
        tracing::trace!(?timeout, "event_loop.phase = \"io\"");
        if let Err(e) = core.backend.tick(timeout) {
            tracing::error!(error = %e, "backend poll failed");
        }
    }

    fn phase_fiber_tick(&mut self) {
        self.handle.core.borrow_mut().fibers.tick();
        tracing::trace!("event_loop.phase = \"fiber_tick\"");
    }

    fn has_work(&mut self) -> bool {
        let mut core = self.handle.core.borrow_mut();
        !core.next_tick.is_empty()
            || !core.deferred.is_empty()
            || !core.pending_external_ops.is_empty()
            || core.fibers.has_work()
            || core.backend.has_work()
    }

    fn run_shutdown_callbacks(&mut self) {
        let (global, terminate) = {
            let mut core = self.handle.core.borrow_mut();
            (
                std::mem::take(&mut core.on_global),
                std::mem::take(&mut core.on_terminate),
            )
        };
        for cb in global {
            cb();
        }
        for cb in terminate {
            cb();
        }
    }
}

/// Returns a promise that fulfills with `()` once `duration` elapses —
/// the building block `timeout`/`api::delay` are built on.
pub fn delay(duration: Duration) -> Promise<()> {
    let handle = LoopHandle::current();
    let (promise, resolver) = Promise::pending();
    handle.add_timer(duration, move || resolver.resolve(()));
    promise
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn bare_loop_core() -> std::rc::Rc<std::cell::RefCell<LoopCore>> {
        let (external_tx, _external_rx) = mpsc::unbounded_channel();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime should build");
        std::rc::Rc::new(std::cell::RefCell::new(LoopCore {
            next_tick: Default::default(),
            deferred: Default::default(),
            on_global: Vec::new(),
            on_terminate: Vec::new(),
            fibers: FiberScheduler::new(),
            external_ids: IdAllocator::new(),
            pending_external_ops: Default::default(),
            external_tx,
            blocking_rt: rt.handle().clone(),
            backend: backend::detect(fibra_reactor::BackendConfig::default()),
        }))
    }
}
