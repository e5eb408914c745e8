//! Process-wide identity allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use sector_protocol::EntityId;

/// First identity handed out by a fresh allocator.
pub const FIRST_ID: u64 = 0x4472_676e_5365_6374;

/// Monotonic 64-bit identity counter.
///
/// Safe to share between threads: the connection side draws correlation
/// ids from it while the scheduler registers entities. Wraps modulo 2^64
/// and never hands out the sentinel.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(FIRST_ID)
    }
}

impl IdAllocator {
    /// Allocator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns the next raw 64-bit value.
    pub fn next_raw(&self) -> u64 {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id != EntityId::NONE.0 {
                return id;
            }
        }
    }

    /// Returns the next entity id.
    pub fn next_entity(&self) -> EntityId {
        EntityId(self.next_raw())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_ids_strictly_increase_single_threaded() {
        let ids = IdAllocator::default();
        let a = ids.next_raw();
        let b = ids.next_raw();
        assert_eq!(a, FIRST_ID);
        assert!(b > a);
    }

    #[test]
    fn test_wraps_and_skips_sentinel() {
        let ids = IdAllocator::starting_at(u64::MAX - 1);
        assert_eq!(ids.next_raw(), u64::MAX - 1);
        assert_eq!(ids.next_raw(), 0);
        assert_eq!(ids.next_raw(), 1);
    }

    #[test]
    fn test_unique_across_threads() {
        let ids = Arc::new(IdAllocator::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || {
                    (0..10_000).map(|_| ids.next_raw()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id:#x}");
            }
        }
        assert_eq!(seen.len(), 80_000);
    }
}
