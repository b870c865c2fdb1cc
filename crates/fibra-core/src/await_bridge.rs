//! The await bridge (spec.md §4.3): how fiber code (a plain `async fn`
//! polled by [`FiberScheduler`](crate::fiber_scheduler::FiberScheduler))
//! suspends on a [`Promise`].
//!
//! Can't be named `await` — that's a Rust keyword.

use fibra_types::Error;

use crate::fiber_scheduler::in_fiber_context;
use crate::promise::Promise;

/// Suspends the calling fiber until `p` settles, returning its outcome.
///
/// 1. Fails fast with [`Error::not_in_coroutine_context`] if no fiber is
///    currently being polled — checked up front, no suspension needed.
/// 2. Returns immediately if `p` is already settled, without yielding to
///    the loop.
/// 3. Otherwise suspends, waking the owning fiber the moment `p` settles.
pub async fn await_promise<T>(p: &Promise<T>) -> Result<T, Error>
where
    T: Clone + 'static,
{
    if !in_fiber_context() {
        return Err(Error::not_in_coroutine_context());
    }
    p.settle_future().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_outside_fiber_context() {
        // await_promise's own fast-path check doesn't require polling the
        // future at all, so a plain block_on-free call through a no-op
        // waker exercises it directly.
        let p: Promise<i32> = Promise::resolved(1);
        let fut = await_promise(&p);
        futures_poll_once(fut);
    }

    fn futures_poll_once<T: Clone + 'static>(
        fut: impl std::future::Future<Output = Result<T, Error>>,
    ) {
        use std::future::Future;
        use std::pin::pin;
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        let waker = unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) };
        let mut cx = Context::from_waker(&waker);

        let mut fut = pin!(fut);
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Err(e)) => assert!(matches!(e.kind, fibra_types::ErrorKind::NotInCoroutineContext)),
            Poll::Ready(Ok(_)) => panic!("expected NotInCoroutineContext"),
            Poll::Pending => panic!("fast-path check must not suspend"),
        }
    }
}
