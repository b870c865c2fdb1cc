/// Scope a [`DeferredTask`] participates in.
///
/// `NextTick`/`Deferred` run every loop iteration (phases 1 and 2 of
/// `EventLoop::tick`); `Global`/`Terminate` run once, at shutdown, in that
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    NextTick,
    Deferred,
    Global,
    Terminate,
}

/// A pending callback paired with the scope that determines when it runs.
pub struct DeferredTask {
    pub scope: Scope,
    pub callback: Box<dyn FnOnce()>,
}

impl DeferredTask {
    pub fn new(scope: Scope, callback: Box<dyn FnOnce()>) -> Self {
        Self { scope, callback }
    }

    pub fn run(self) {
        (self.callback)()
    }
}
