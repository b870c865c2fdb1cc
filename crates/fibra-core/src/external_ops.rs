//! The external-op completion queue (spec.md §6): the one consumed-from-
//! collaborators boundary where genuine OS threads touch runtime state,
//! and only through [`ExternalCompletion`] values crossing a channel.

use fibra_types::{Error, ExternalOpId, Value};

use crate::loop_handle::LoopHandle;
use crate::promise::Promise;

/// A unit of off-loop work's outcome, delivered on the loop's phase-4
/// queue and matched back to its `PromiseResolver` by `id`.
pub struct ExternalCompletion {
    pub id: ExternalOpId,
    pub result: Result<Value, Error>,
}

/// Enqueues off-loop work onto a thread pool and resolves with its
/// outcome once the completion arrives. Implementors decide how `kind`
/// and `args` map onto actual work; this runtime ships one concrete
/// stand-in, [`BlockingOpDriver`], used only by tests.
pub trait ExternalOpDriver {
    fn submit(&self, kind: &str, args: Value) -> Promise<Value>;
}

/// Runs `kind`-dispatched work via `spawn_blocking` on the current
/// [`LoopHandle`]. Supports `"echo"` (returns `args` unchanged) and
/// `"fail"` (rejects with a user error carrying `args`'s text, if any) —
/// enough surface for exercising the completion queue without a real
/// DB/HTTP client, which stays out of scope as a feature.
pub struct BlockingOpDriver;

impl ExternalOpDriver for BlockingOpDriver {
    fn submit(&self, kind: &str, args: Value) -> Promise<Value> {
        let handle = LoopHandle::current();
        let kind = kind.to_string();
        handle.submit_external_op(move || dispatch(&kind, args))
    }
}

fn dispatch(kind: &str, args: Value) -> Result<Value, Error> {
    match kind {
        "echo" => Ok(args),
        "fail" => {
            let message = match &args {
                Value::Text(s) => s.clone(),
                other => format!("{other:?}"),
            };
            Err(Error::user(message))
        }
        other => Err(Error::user(format!("unknown external op kind: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use crate::config::LoopConfig;

    #[test]
    fn echo_round_trips_through_the_completion_queue() {
        let mut loop_ = EventLoop::new(LoopConfig::default());
        let handle = loop_.handle();
        let _guard = crate::loop_handle::LoopHandle::install(handle.clone());

        let driver = BlockingOpDriver;
        let p = driver.submit("echo", Value::Int(7));
        let result = loop_.run(p);
        assert_eq!(result.unwrap(), Value::Int(7));
    }

    #[test]
    fn fail_rejects_with_the_message() {
        let mut loop_ = EventLoop::new(LoopConfig::default());
        let handle = loop_.handle();
        let _guard = crate::loop_handle::LoopHandle::install(handle.clone());

        let driver = BlockingOpDriver;
        let p = driver.submit("fail", Value::Text("boom".into()));
        let err = loop_.run(p).unwrap_err();
        assert!(matches!(err, crate::error::RuntimeError::Rejected(_)));
    }
}
