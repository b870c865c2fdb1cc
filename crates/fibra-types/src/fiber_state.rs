/// Observable lifecycle state of a [fiber](crate), mirrored 1:1 onto the
/// executor's view of its boxed future: `NotStarted` before the first
/// poll, `Running` while inside a poll call, `Suspended` after a `Pending`
/// poll, `Terminated` after a `Ready` poll (success or panic).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiberState {
    NotStarted,
    Running,
    Suspended,
    Terminated,
}

impl FiberState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Suspended)
    }
}
