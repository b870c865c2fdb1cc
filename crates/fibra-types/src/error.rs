use std::fmt;

/// Coarse failure category for runtime errors.
///
/// Mirrors the error taxonomy from the runtime design: each kind maps to a
/// specific propagation policy (thrown synchronously, logged-and-continue,
/// or surfaced to the caller of `run`/`run_with_timeout`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// `await_promise` called outside a fiber. Programmer bug, thrown synchronously.
    NotInCoroutineContext,
    /// `timeout`/`run_with_timeout` elapsed before the inner promise settled.
    Timeout,
    /// `any()` rejected because every input promise rejected.
    AggregateRejection,
    /// A `then`/`catch`/`finally` continuation panicked or returned an error.
    Callback,
    /// The reactor backend's poll call failed.
    Backend,
    /// The host coroutine engine (fiber scheduler) refused to resume a fiber.
    FiberResume,
    /// Catch-all for rejection reasons supplied directly by user code.
    User,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotInCoroutineContext => "not_in_coroutine_context",
            Self::Timeout => "timeout",
            Self::AggregateRejection => "aggregate_rejection",
            Self::Callback => "callback",
            Self::Backend => "backend",
            Self::FiberResume => "fiber_resume",
            Self::User => "user",
        };
        f.write_str(s)
    }
}

/// The runtime's single error currency.
///
/// Any rejection reason that is not already an `Error` is wrapped as
/// `ErrorKind::User` with `message` set from its `Display`/`Debug`
/// rendering (the `reject(r)` wrapping rule). `reasons` is populated only
/// for `ErrorKind::AggregateRejection`, in input order (see `any()`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub reasons: Vec<Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reasons: Vec::new(),
        }
    }

    /// Wrap a plain message as a user-rejection error.
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User, message)
    }

    pub fn not_in_coroutine_context() -> Self {
        Self::new(
            ErrorKind::NotInCoroutineContext,
            "await_promise called outside a fiber",
        )
    }

    pub fn timeout(seconds: f64) -> Self {
        Self::new(ErrorKind::Timeout, format!("timed out after {seconds}s"))
    }

    /// Build an `AggregateRejection` carrying ordered reasons (the `any()` contract).
    pub fn aggregate(reasons: Vec<Error>) -> Self {
        Self {
            kind: ErrorKind::AggregateRejection,
            message: format!("all {} promises rejected", reasons.len()),
            reasons,
        }
    }

    pub fn callback(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Callback, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backend, message)
    }

    pub fn fiber_resume(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FiberResume, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.reasons.is_empty() {
            write!(f, " ({} reasons)", self.reasons.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_preserves_reason_order() {
        let e1 = Error::user("first");
        let e2 = Error::user("second");
        let agg = Error::aggregate(vec![e1.clone(), e2.clone()]);

        assert_eq!(agg.kind, ErrorKind::AggregateRejection);
        assert_eq!(agg.reasons, vec![e1, e2]);
    }

    #[test]
    fn timeout_error_is_recognized() {
        let e = Error::timeout(0.05);
        assert!(e.is_timeout());
        assert!(!Error::user("x").is_timeout());
    }
}
