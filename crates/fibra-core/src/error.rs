use fibra_reactor::ReactorError;
use fibra_types::Error;
use thiserror::Error as ThisError;

/// Crate-boundary error: failures that prevent the loop itself from
/// running, as opposed to [`Error`], the currency used for promise
/// rejections inside a running loop.
#[derive(Debug, ThisError)]
pub enum RuntimeError {
    #[error("requested backend is unavailable: {0}")]
    BackendUnavailable(String),
    #[error(transparent)]
    Reactor(#[from] ReactorError),
    #[error("{0}")]
    Rejected(Error),
    #[error("the loop made no progress: no fibers, timers, watchers, or external ops pending")]
    Deadlocked,
}

impl From<Error> for RuntimeError {
    fn from(e: Error) -> Self {
        RuntimeError::Rejected(e)
    }
}
