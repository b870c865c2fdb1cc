use std::collections::HashMap;
use std::sync::Arc;

/// A non-blocking stream handle plus a closed flag and opaque metadata.
///
/// Methods are pure value-returning: [`Socket::close`] consumes `self` and
/// returns a new, closed `Socket` rather than mutating in place, so closing
/// twice is trivially idempotent (the second call just produces an
/// identical closed value).
#[derive(Clone)]
pub struct Socket<H> {
    handle: Arc<H>,
    closed: bool,
    metadata: Arc<HashMap<String, String>>,
}

impl<H> Socket<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle: Arc::new(handle),
            closed: false,
            metadata: Arc::new(HashMap::new()),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.metadata).insert(key.into(), value.into());
        self
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Idempotent: closing an already-closed socket returns an equivalent value.
    pub fn close(self) -> Self {
        Self {
            closed: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent() {
        let s = Socket::new(42u32).close();
        let s2 = s.clone().close();
        assert!(s.is_closed());
        assert!(s2.is_closed());
    }

    #[test]
    fn metadata_carries_through_close() {
        let s = Socket::new(1u32).with_metadata("peer", "127.0.0.1:9000");
        let s = s.close();
        assert_eq!(s.metadata("peer"), Some("127.0.0.1:9000"));
    }
}
