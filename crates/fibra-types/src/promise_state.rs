use crate::error::Error;

/// Settlement state of a [`crate`] promise.
///
/// Transitions only `Pending -> Fulfilled` or `Pending -> Rejected`,
/// exactly once (I1). This type carries no continuations — those are
/// owned by `fibra-core`'s `Promise<T>`, which is the only thing allowed
/// to mutate this state.
#[derive(Clone, Debug)]
pub enum PromiseState<T> {
    Pending,
    Fulfilled(T),
    Rejected(Error),
}

impl<T> PromiseState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }
}
