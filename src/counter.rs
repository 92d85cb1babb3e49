//! Atomic monotonic counter with reset-and-return semantics
//!
//! The counter is the storage primitive behind the window's per-bucket
//! tallies. `reset` is a compare-and-swap loop so the returned value is one
//! the counter actually held immediately before zeroing, never a stale or
//! skipped reading.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe monotonic counter.
///
/// All operations are lock-free and safe under unbounded concurrent callers.
///
/// # Example
/// ```
/// use breakwater::Counter;
///
/// let counter = Counter::new();
/// counter.increment();
/// counter.increment();
/// assert_eq!(counter.value(), 2);
/// assert_eq!(counter.reset(), 2);
/// assert_eq!(counter.value(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicU64,
}

impl Counter {
    /// Create a new counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count, read without mutating
    pub fn value(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Atomically add one to the count
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Atomically set the counter to zero and return the value observed
    /// immediately before the reset.
    ///
    /// Implemented as a compare-and-swap retry loop: on conflict with a
    /// concurrent `increment`, the loop re-reads and retries, so the returned
    /// value is always one the counter genuinely held.
    pub fn reset(&self) -> u64 {
        let mut seen = self.count.load(Ordering::SeqCst);
        loop {
            match self
                .count
                .compare_exchange(seen, 0, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(previous) => return previous,
                Err(actual) => seen = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_value() {
        let counter = Counter::new();
        assert_eq!(counter.value(), 0);

        counter.increment();
        counter.increment();
        counter.increment();
        assert_eq!(counter.value(), 3);

        // Reads do not mutate
        assert_eq!(counter.value(), 3);
    }

    #[test]
    fn test_reset_returns_previous_value() {
        let counter = Counter::new();
        for _ in 0..42 {
            counter.increment();
        }

        assert_eq!(counter.reset(), 42);
        assert_eq!(counter.value(), 0);

        // Resetting an already-zero counter returns zero
        assert_eq!(counter.reset(), 0);
    }

    #[test]
    fn test_concurrent_increments_never_lost() {
        let counter = Arc::new(Counter::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    counter.increment();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.value(), 8_000);
    }

    #[test]
    fn test_concurrent_reset_accounts_for_every_increment() {
        let counter = Arc::new(Counter::new());
        let mut writers = Vec::new();

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            writers.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    counter.increment();
                }
            }));
        }

        let resetter = {
            let counter = Arc::clone(&counter);
            std::thread::spawn(move || {
                let mut drained = 0;
                for _ in 0..100 {
                    drained += counter.reset();
                    std::thread::yield_now();
                }
                drained
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        let drained = resetter.join().unwrap();

        // Every increment landed either in a reset's return value or in the
        // final count, exactly once.
        assert_eq!(drained + counter.value(), 4_000);
    }
}
