//! Thread-local accessor to the currently-running [`EventLoop`](crate::EventLoop)'s
//! queues (spec.md §9's "explicit owned value ... threadlocal-stashed
//! behind a context accessor", replacing the original's singleton).
//!
//! A `LoopHandle` is cheap to clone (it's `Rc`-backed) and is only ever
//! valid on the thread currently inside [`EventLoop::run`](crate::EventLoop::run) —
//! nothing here is `Send`; the runtime is single-threaded by design.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use fibra_reactor::Backend;
use fibra_types::{ExternalOpId, FiberId, IdAllocator, Scope, TimerId, Value};
use tokio::sync::mpsc;

use crate::external_ops::ExternalCompletion;
use crate::fiber_scheduler::FiberScheduler;
use crate::promise::{Promise, PromiseResolver};

pub(crate) struct LoopCore {
    pub(crate) next_tick: VecDeque<Box<dyn FnOnce()>>,
    pub(crate) deferred: VecDeque<Box<dyn FnOnce()>>,
    pub(crate) on_global: Vec<Box<dyn FnOnce()>>,
    pub(crate) on_terminate: Vec<Box<dyn FnOnce()>>,
    pub(crate) fibers: FiberScheduler,
    pub(crate) external_ids: IdAllocator,
    pub(crate) pending_external_ops: std::collections::HashMap<ExternalOpId, PromiseResolver<Value>>,
    pub(crate) external_tx: mpsc::UnboundedSender<ExternalCompletion>,
    pub(crate) blocking_rt: tokio::runtime::Handle,
    pub(crate) backend: Box<dyn Backend>,
}

#[derive(Clone)]
pub struct LoopHandle {
    pub(crate) core: Rc<RefCell<LoopCore>>,
}

thread_local! {
    static CURRENT: RefCell<Option<LoopHandle>> = const { RefCell::new(None) };
}

pub(crate) struct LoopHandleGuard;

impl Drop for LoopHandleGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| *c.borrow_mut() = None);
    }
}

impl LoopHandle {
    pub(crate) fn install(handle: LoopHandle) -> LoopHandleGuard {
        CURRENT.with(|c| *c.borrow_mut() = Some(handle));
        LoopHandleGuard
    }

    /// Fetches the handle for the loop currently driving this thread.
    ///
    /// # Panics
    /// Panics if called outside [`EventLoop::run`](crate::EventLoop::run) — the
    /// same "programmer error, not a recoverable condition" class as the
    /// original's singleton misuse, but localized to a single accessor.
    pub fn current() -> Self {
        CURRENT
            .with(|c| c.borrow().clone())
            .expect("LoopHandle::current() called outside EventLoop::run")
    }

    pub fn try_current() -> Option<Self> {
        CURRENT.with(|c| c.borrow().clone())
    }

    /// Schedules `cb` to run on the next NextTick phase (phase 1). This is
    /// how promise continuations honor the "never inline" rule (I3): even
    /// a continuation registered on an already-settled promise is always
    /// deferred here, never invoked synchronously.
    pub fn next_tick(&self, cb: impl FnOnce() + 'static) {
        self.core.borrow_mut().next_tick.push_back(Box::new(cb));
    }

    pub fn defer(&self, scope: Scope, cb: impl FnOnce() + 'static) {
        let mut core = self.core.borrow_mut();
        match scope {
            Scope::NextTick => core.next_tick.push_back(Box::new(cb)),
            Scope::Deferred => core.deferred.push_back(Box::new(cb)),
            Scope::Global => core.on_global.push(Box::new(cb)),
            Scope::Terminate => core.on_terminate.push(Box::new(cb)),
        }
    }

    pub fn add_fiber<F>(&self, future: F) -> FiberId
    where
        F: std::future::Future<Output = Result<Value, fibra_types::Error>> + 'static,
    {
        self.core.borrow_mut().fibers.spawn(future)
    }

    /// Schedules `callback` to run once `delay` elapses, via the backend's
    /// timer wheel. Fires during the loop's Timers phase (phase 3).
    pub fn add_timer(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        self.core.borrow_mut().backend.add_timer(delay, Box::new(callback))
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.core.borrow_mut().backend.cancel_timer(id)
    }

    /// Submits `work` to run on a real OS thread (`spawn_blocking`),
    /// returning a promise that resolves once its completion arrives on
    /// the loop's phase-4 queue. This is the only place a genuine thread
    /// touches runtime state, and it does so only through the completion
    /// channel — never by reaching back into a promise/fiber/timer/watcher
    /// directly.
    pub fn submit_external_op<F>(&self, work: F) -> Promise<Value>
    where
        F: FnOnce() -> Result<Value, fibra_types::Error> + Send + 'static,
    {
        let (promise, resolver) = Promise::pending();
        let id = {
            let mut core = self.core.borrow_mut();
            let id = ExternalOpId::from_raw(core.external_ids.next());
            core.pending_external_ops.insert(id, resolver);
            id
        };

        let tx = self.core.borrow().external_tx.clone();
        self.core.borrow().blocking_rt.spawn_blocking(move || {
            let result = work();
            let _ = tx.send(ExternalCompletion { id, result });
        });

        promise
    }
}
