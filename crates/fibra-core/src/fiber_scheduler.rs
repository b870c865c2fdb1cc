//! Fiber scheduler (spec.md §4.2).
//!
//! Per spec.md §9's stackless-coroutine fallback, a fiber is a boxed Rust
//! future. The scheduler is a small hand-rolled, single-threaded executor
//! rather than `tokio::task`: fibers are polled *only* during the loop's
//! dedicated fiber-tick phase (phase 6), never eagerly when their waker
//! fires — a stronger contract than a general-purpose executor's "poll
//! whenever woken".

use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};

use fibra_types::{Error, FiberId, FiberState, IdAllocator, Value};

thread_local! {
    /// Whether the calling stack is currently inside `FiberScheduler::poll_one`.
    /// `await_promise` consults this for its `NotInCoroutineContext` guard;
    /// actual re-scheduling of a suspended fiber goes through the waker
    /// handed to that poll call, not through this flag.
    static IN_FIBER_CONTEXT: Cell<bool> = const { Cell::new(false) };
}

pub(crate) fn in_fiber_context() -> bool {
    IN_FIBER_CONTEXT.with(Cell::get)
}

struct FiberContextGuard(bool);

impl FiberContextGuard {
    fn enter() -> Self {
        let previous = IN_FIBER_CONTEXT.with(Cell::get);
        IN_FIBER_CONTEXT.with(|c| c.set(true));
        Self(previous)
    }
}

impl Drop for FiberContextGuard {
    fn drop(&mut self) {
        IN_FIBER_CONTEXT.with(|c| c.set(self.0));
    }
}

/// Required by `std::task::Wake`, which demands `Arc<W: Send + Sync>` even
/// though the rest of this runtime is deliberately single-threaded — this
/// is the one place a thread-safe primitive is load-bearing rather than
/// incidental.
struct FiberWaker {
    id: FiberId,
    ready: Arc<Mutex<VecDeque<FiberId>>>,
}

impl Wake for FiberWaker {
    fn wake(self: Arc<Self>) {
        self.ready.lock().unwrap().push_back(self.id);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.lock().unwrap().push_back(self.id);
    }
}

type BoxedFiber = Pin<Box<dyn Future<Output = Result<Value, Error>>>>;

pub struct FiberScheduler {
    fibers: HashMap<FiberId, BoxedFiber>,
    states: HashMap<FiberId, FiberState>,
    ready: Arc<Mutex<VecDeque<FiberId>>>,
    ids: IdAllocator,
}

impl Default for FiberScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FiberScheduler {
    pub fn new() -> Self {
        Self {
            fibers: HashMap::new(),
            states: HashMap::new(),
            ready: Arc::new(Mutex::new(VecDeque::new())),
            ids: IdAllocator::new(),
        }
    }

    pub fn spawn<F>(&mut self, future: F) -> FiberId
    where
        F: Future<Output = Result<Value, Error>> + 'static,
    {
        let id = FiberId::from_raw(self.ids.next());
        self.fibers.insert(id, Box::pin(future));
        self.states.insert(id, FiberState::NotStarted);
        self.ready.lock().unwrap().push_back(id);
        id
    }

    pub fn state_of(&self, id: FiberId) -> Option<FiberState> {
        self.states.get(&id).copied()
    }

    pub fn has_work(&self) -> bool {
        !self.fibers.is_empty()
    }

    /// Drains the ready queue once and polls each runnable fiber at most
    /// once (phase 6). A fiber woken *during* this drain (e.g. by a
    /// `nextTick` continuation run earlier this same iteration reaching a
    /// settled promise) runs on the next tick, not this one — matching
    /// the loop's FIFO-per-phase contract.
    pub fn tick(&mut self) {
        let batch: Vec<FiberId> = {
            let mut ready = self.ready.lock().unwrap();
            ready.drain(..).collect()
        };

        let mut polled = HashSet::new();
        for id in batch {
            if !polled.insert(id) {
                continue;
            }
            self.poll_one(id);
        }
    }

    fn poll_one(&mut self, id: FiberId) {
        let runnable = self
            .states
            .get(&id)
            .map(FiberState::is_runnable)
            .unwrap_or(false);
        if !runnable {
            return;
        }

        self.states.insert(id, FiberState::Running);
        let waker = Waker::from(Arc::new(FiberWaker {
            id,
            ready: self.ready.clone(),
        }));
        let mut cx = Context::from_waker(&waker);

        let _ctx_guard = FiberContextGuard::enter();
        let poll_result = {
            let Some(fiber) = self.fibers.get_mut(&id) else {
                return;
            };
            std::panic::catch_unwind(AssertUnwindSafe(|| fiber.as_mut().poll(&mut cx)))
        };

        match poll_result {
            Ok(Poll::Ready(outcome)) => {
                self.states.insert(id, FiberState::Terminated);
                self.fibers.remove(&id);
                if let Err(e) = outcome {
                    tracing::error!(fiber = %id, error = %e, "fiber terminated with error");
                }
            }
            Ok(Poll::Pending) => {
                self.states.insert(id, FiberState::Suspended);
            }
            Err(_) => {
                self.states.insert(id, FiberState::Terminated);
                self.fibers.remove(&id);
                tracing::error!(fiber = %id, "fiber panicked during poll");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn spawned_fiber_runs_to_completion_over_ticks() {
        let mut sched = FiberScheduler::new();
        let polls = Rc::new(RefCell::new(0));
        let p = polls.clone();

        sched.spawn(async move {
            *p.borrow_mut() += 1;
            std::future::ready(()).await; // immediate-ready inner future, no real suspension
            Ok(Value::Unit)
        });

        sched.tick();
        assert_eq!(*polls.borrow(), 1);
    }

    #[test]
    fn not_in_fiber_context_outside_poll() {
        assert!(!in_fiber_context());
    }
}
