use fibra_types::WatcherId;

/// Errors produced by the reactor (timer wheel, stream/socket watchers,
/// and the backend abstraction).
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("backend poll failed: {0}")]
    PollFailed(String),
    #[error("no such watcher: {0}")]
    UnknownWatcher(WatcherId),
    #[error("failed to register handle with backend: {0}")]
    RegisterFailed(String),
}
