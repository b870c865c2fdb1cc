//! End-to-end scenarios exercising the public API holistically (spec.md
//! §8) rather than one module's internals.

use std::time::{Duration, Instant};

use fibra_types::{Error, Value};

use crate::api;
use crate::error::RuntimeError;
use crate::event_loop::delay;

#[test]
fn delay_sequence_returns_its_value_after_the_wall_clock_elapses() {
    let start = Instant::now();
    let result = api::run(async {
        crate::await_promise(&delay(Duration::from_millis(50))).await?;
        Ok(7)
    });
    assert_eq!(result.unwrap(), 7);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn concurrency_bound_runs_at_most_k_tasks_at_once() {
    let tasks: Vec<_> = (0..20)
        .map(|_| {
            || -> crate::Promise<()> {
                let handle = crate::LoopHandle::current();
                let (promise, resolver) = crate::Promise::pending();
                handle.add_timer(Duration::from_millis(100), move || resolver.resolve(()));
                promise
            }
        })
        .collect();

    let start = Instant::now();
    let result = api::run_concurrent(tasks, 5);
    let elapsed = start.elapsed();

    assert!(result.is_ok());
    // 20 tasks at 5 in flight = 4 sequential batches of ~100ms each.
    assert!(elapsed >= Duration::from_millis(400));
    assert!(elapsed < Duration::from_millis(450));
}

#[test]
fn all_is_fail_fast_on_the_first_rejection() {
    let start = Instant::now();
    let result: Result<Vec<i32>, RuntimeError> = api::run(async {
        let slow_ok = delay(Duration::from_millis(100)).then(|_| 1, |e| panic!("{e}"));
        let fast_err = crate::Promise::<i32>::rejected(Error::user("boom"));
        let slower_ok = delay(Duration::from_millis(200)).then(|_| 3, |e| panic!("{e}"));
        crate::all(vec![slow_ok, fast_err, slower_ok]).await
    });

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn run_with_timeout_rejects_with_timeout_error() {
    let start = Instant::now();
    let p = delay(Duration::from_secs(1)).then(|_| Value::Unit, |_| Value::Unit);
    let result = api::run_with_timeout(p, Duration::from_millis(50));

    match result {
        Err(RuntimeError::Rejected(e)) => assert!(e.is_timeout()),
        other => panic!("expected a timeout rejection, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_millis(70));
}

/// The timer phase runs before the next_tick queue it feeds is drained:
/// a callback that both does work and enqueues a `nextTick` sees its own
/// work land first, and two `nextTick`s registered in sequence preserve
/// FIFO order into the following iteration (P2/P8).
#[test]
fn timer_phase_work_and_its_next_tick_fallout_observe_fifo_order() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let result = api::run(async {
        let order = order.clone();
        let handle = crate::LoopHandle::current();
        let (done, done_resolver) = crate::Promise::<()>::pending();

        let order_for_timer = order.clone();
        handle.add_timer(Duration::from_millis(10), move || {
            order_for_timer.borrow_mut().push("timer");
            let order_for_first = order_for_timer.clone();
            crate::LoopHandle::current().next_tick(move || {
                order_for_first.borrow_mut().push("first_next_tick");
            });
            let order_for_second = order_for_timer.clone();
            crate::LoopHandle::current().next_tick(move || {
                order_for_second.borrow_mut().push("second_next_tick");
                done_resolver.resolve(());
            });
        });

        crate::await_promise(&done).await?;
        Ok(())
    });

    assert!(result.is_ok());
    let observed = order.borrow().clone();
    assert_eq!(observed, vec!["timer", "first_next_tick", "second_next_tick"]);
}

#[test]
fn any_rejects_with_an_ordered_aggregate_when_every_input_rejects() {
    let result: Result<i32, RuntimeError> = api::run(async {
        let e1 = Error::user("first");
        let e2 = Error::user("second");
        crate::any(vec![
            crate::Promise::<i32>::rejected(e1),
            crate::Promise::<i32>::rejected(e2),
        ])
        .await
    });

    match result {
        Err(RuntimeError::Rejected(e)) => {
            assert_eq!(e.reasons.len(), 2);
            assert_eq!(e.reasons[0].message, "first");
            assert_eq!(e.reasons[1].message, "second");
        }
        other => panic!("expected an aggregate rejection, got {other:?}"),
    }
}
