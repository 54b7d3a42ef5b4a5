use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;

use crate::node::Stamp;

/// The global timestamp authority.
pub trait Clock: Send + Sync {
    /// Issues a fresh write timestamp, strictly increasing across calls.
    fn next_write_stamp(&self) -> Stamp;

    /// Current value of the clock, without advancing it. Snapshot guards pin
    /// themselves to this value; retirement bags are sealed with it.
    fn read_stamp(&self) -> Stamp;
}

/// Shared monotone counter clock.
pub struct GlobalClock {
    stamp: CachePadded<AtomicI64>,
}

impl GlobalClock {
    pub fn new() -> Self {
        Self {
            stamp: CachePadded::new(AtomicI64::new(0)),
        }
    }
}

impl Default for GlobalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for GlobalClock {
    #[inline]
    fn next_write_stamp(&self) -> Stamp {
        self.stamp.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[inline]
    fn read_stamp(&self) -> Stamp {
        self.stamp.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::scope;

    #[test]
    fn stamps_strictly_increase() {
        const THREADS: usize = 4;
        const ITER: usize = 1024;

        let clock = GlobalClock::new();
        let stamps: Vec<Vec<Stamp>> = scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let clock = &clock;
                    s.spawn(move || (0..ITER).map(|_| clock.next_write_stamp()).collect())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Strictly increasing per thread, all distinct across threads.
        let mut all = Vec::new();
        for per_thread in stamps {
            assert!(per_thread.windows(2).all(|w| w[0] < w[1]));
            all.extend(per_thread);
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), THREADS * ITER);
        assert_eq!(clock.read_stamp(), (THREADS * ITER) as Stamp);
    }
}
