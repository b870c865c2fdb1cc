use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter shared by all opaque id kinds below.
///
/// Each `EventLoop` owns one of these (not a process-global), so ids are
/// only unique within the loop's lifetime, matching the `Timer.id` contract
/// ("opaque string unique within the loop's lifetime").
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

macro_rules! opaque_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

opaque_id!(FiberId, "fiber-");
opaque_id!(TimerId, "timer-");
opaque_id!(WatcherId, "watcher-");
opaque_id!(ExternalOpId, "extop-");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_hands_out_increasing_ids() {
        let alloc = IdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert!(b > a);
    }

    #[test]
    fn opaque_id_displays_with_prefix() {
        let id = TimerId::from_raw(7);
        assert_eq!(id.to_string(), "timer-7");
    }
}
