//! Promise combinators (spec.md §4.5): `all`, `race`, `any`, `timeout`,
//! `concurrent`, `batch`.
//!
//! Each is a manual multi-poll `Future` over a `Vec` of
//! [`Settle`](crate::promise::Settle) (or, for `concurrent`/`batch`, over
//! lazily-started promises) rather than a chain of sequential
//! `await_promise` calls — sequential `.await` would serialize
//! *observation* of already-independent work, which is wrong for
//! fail-fast semantics where the first rejection anywhere must win
//! immediately. These run inside an already-scheduled fiber, so they poll
//! [`Promise::settle_future`](crate::promise::Promise) directly rather
//! than going through the `await_promise` bridge's coroutine-context
//! check.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use fibra_types::Error;

use crate::promise::{Promise, Settle};

/// Resolves once every input has resolved, in input order; rejects with
/// the first rejection observed (fail-fast) — the other inputs' eventual
/// settlement is still polled to completion but its outcome is discarded.
pub async fn all<T: Clone + 'static>(promises: Vec<Promise<T>>) -> Result<Vec<T>, Error> {
    AllFuture {
        slots: vec![None; promises.len()],
        remaining: promises.len(),
        futures: promises.iter().map(Promise::settle_future).collect(),
    }
    .await
}

struct AllFuture<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    futures: Vec<Settle<T>>,
}

impl<T: Clone + 'static> Future for AllFuture<T> {
    type Output = Result<Vec<T>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        for (i, fut) in this.futures.iter_mut().enumerate() {
            if this.slots[i].is_some() {
                continue;
            }
            let fut = Pin::new(fut);
            match fut.poll(cx) {
                Poll::Ready(Ok(v)) => {
                    this.slots[i] = Some(v);
                    this.remaining -= 1;
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }
        }
        if this.remaining == 0 {
            let values = this.slots.iter_mut().map(|s| s.take().unwrap()).collect();
            Poll::Ready(Ok(values))
        } else {
            Poll::Pending
        }
    }
}

/// Resolves or rejects with whichever input settles first, fulfilled or
/// rejected alike.
pub async fn race<T: Clone + 'static>(promises: Vec<Promise<T>>) -> Result<T, Error> {
    RaceFuture {
        futures: promises.iter().map(Promise::settle_future).collect(),
    }
    .await
}

struct RaceFuture<T> {
    futures: Vec<Settle<T>>,
}

impl<T: Clone + 'static> Future for RaceFuture<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        for fut in this.futures.iter_mut() {
            let fut = Pin::new(fut);
            if let Poll::Ready(result) = fut.poll(cx) {
                return Poll::Ready(result);
            }
        }
        // `race([])` stays pending forever (locked Open Question).
        Poll::Pending
    }
}

/// Resolves with the first fulfillment; rejects with an
/// `AggregateRejection` (reasons in input order) only once every input
/// has rejected.
pub async fn any<T: Clone + 'static>(promises: Vec<Promise<T>>) -> Result<T, Error> {
    AnyFuture {
        reasons: vec![None; promises.len()],
        done: vec![false; promises.len()],
        futures: promises.iter().map(Promise::settle_future).collect(),
    }
    .await
}

struct AnyFuture<T> {
    reasons: Vec<Option<Error>>,
    done: Vec<bool>,
    futures: Vec<Settle<T>>,
}

impl<T: Clone + 'static> Future for AnyFuture<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        for (i, fut) in this.futures.iter_mut().enumerate() {
            if this.done[i] {
                continue;
            }
            let fut = Pin::new(fut);
            match fut.poll(cx) {
                Poll::Ready(Ok(v)) => return Poll::Ready(Ok(v)),
                Poll::Ready(Err(e)) => {
                    this.done[i] = true;
                    this.reasons[i] = Some(e);
                }
                Poll::Pending => {}
            }
        }
        if this.done.iter().all(|d| *d) {
            let reasons = this.reasons.iter_mut().map(|r| r.take().unwrap()).collect();
            Poll::Ready(Err(Error::aggregate(reasons)))
        } else {
            Poll::Pending
        }
    }
}

/// Races `p` against a timer of `duration`; rejects with
/// [`Error::timeout`] if the timer wins. Per the runtime's locked Open
/// Question decision, `timeout` does not cancel `p`'s own work once it
/// has orphaned it — `p` keeps running, its eventual outcome just isn't
/// observed.
pub async fn timeout<T: Clone + 'static>(p: &Promise<T>, duration: Duration) -> Result<T, Error> {
    let timer = crate::event_loop::delay(duration);
    TimeoutFuture {
        inner: p.settle_future(),
        timer: timer.settle_future(),
        duration,
    }
    .await
}

struct TimeoutFuture<T> {
    inner: Settle<T>,
    timer: Settle<()>,
    duration: Duration,
}

impl<T: Clone + 'static> Future for TimeoutFuture<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let inner = Pin::new(&mut this.inner);
        if let Poll::Ready(result) = inner.poll(cx) {
            return Poll::Ready(result);
        }
        let timer = Pin::new(&mut this.timer);
        if timer.poll(cx).is_ready() {
            return Poll::Ready(Err(Error::timeout(this.duration.as_secs_f64())));
        }
        Poll::Pending
    }
}

/// Runs lazily-built tasks with at most `limit` in flight at once,
/// returning results in input order. `failFast` is hardcoded `true` per
/// the runtime's locked Open Question decision: the first rejection
/// anywhere aborts the whole combinator immediately.
pub async fn concurrent<T, F>(tasks: Vec<F>, limit: usize) -> Result<Vec<T>, Error>
where
    T: Clone + 'static,
    F: FnOnce() -> Promise<T> + 'static,
{
    let limit = limit.max(1);
    let mut remaining: Vec<Option<F>> = tasks.into_iter().map(Some).collect();
    let total = remaining.len();
    let mut results: Vec<Option<T>> = vec![None; total];
    let mut in_flight: Vec<Option<(usize, Settle<T>)>> = Vec::with_capacity(limit);

    let mut next_index = 0;
    loop {
        while in_flight.len() < limit && next_index < total {
            if let Some(task) = remaining[next_index].take() {
                let promise = task();
                in_flight.push(Some((next_index, promise.settle_future())));
            }
            next_index += 1;
        }

        if in_flight.is_empty() {
            break;
        }

        let finished = std::future::poll_fn(|cx| {
            for slot in in_flight.iter_mut() {
                let Some((idx, fut)) = slot else { continue };
                let idx = *idx;
                let pinned = Pin::new(fut);
                if let Poll::Ready(result) = pinned.poll(cx) {
                    *slot = None;
                    return Poll::Ready((idx, result));
                }
            }
            Poll::Pending
        })
        .await;

        let (idx, result) = finished;
        in_flight.retain(Option::is_some);
        match result {
            Ok(v) => results[idx] = Some(v),
            Err(e) => return Err(e),
        }
    }

    Ok(results.into_iter().map(|r| r.unwrap()).collect())
}

/// Runs tasks in sequential batches of `batch_size`, each batch executed
/// via [`concurrent`] with concurrency `limit` (defaulting to
/// `batch_size`).
pub async fn batch<T, F>(
    tasks: Vec<F>,
    batch_size: usize,
    limit: Option<usize>,
) -> Result<Vec<T>, Error>
where
    T: Clone + 'static,
    F: FnOnce() -> Promise<T> + 'static,
{
    let batch_size = batch_size.max(1);
    let limit = limit.unwrap_or(batch_size);
    let mut out = Vec::with_capacity(tasks.len());
    let mut tasks = tasks;

    while !tasks.is_empty() {
        let chunk: Vec<F> = tasks.drain(..batch_size.min(tasks.len())).collect();
        out.extend(concurrent(chunk, limit).await?);
    }
    Ok(out)
}
