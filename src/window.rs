//! Sliding statistical window: a fixed ring of time buckets
//!
//! The window records operation outcomes (success, failure, short-circuit)
//! into the "current" bucket of a fixed-size ring. A background rollover task
//! advances the ring once per bucket slice and clears the recycled slot, so
//! after a full window duration the oldest data has completely aged out.
//!
//! # Design
//!
//! Aggregates are derived by scanning every bucket at read time rather than
//! kept as running totals. Bucket mutation stays lock-free (field-level
//! atomics); the ring's cursor lock is only contended between recorders
//! (shared) and rollover (exclusive), so a mark is never lost to a concurrent
//! rollover and never attributed to two buckets at once.
//!
//! # Example
//!
//! ```no_run
//! use breakwater::Window;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), breakwater::ConfigError> {
//!     // Ten one-second buckets covering the last ten seconds
//!     let window = Window::new(10, Duration::from_secs(10))?;
//!
//!     assert_eq!(window.total(), 0);
//!     assert_eq!(window.error_rate(), 0);
//!
//!     window.shutdown();
//!     Ok(())
//! }
//! ```

use crate::counter::Counter;
use crate::error::ConfigError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

/// One time slice's outcome tallies.
///
/// The three counts are independent atomics: concurrent marks never lose
/// updates, but a reader may observe the fields at slightly different
/// instants. The aggregate statistic is advisory, not transactional.
#[derive(Debug, Default)]
struct Bucket {
    successes: Counter,
    failures: Counter,
    short_circuits: Counter,
}

impl Bucket {
    fn mark_success(&self) {
        self.successes.increment();
    }

    fn mark_failure(&self) {
        self.failures.increment();
    }

    fn mark_short_circuited(&self) {
        self.short_circuits.increment();
    }

    fn successes(&self) -> u64 {
        self.successes.value()
    }

    fn failures(&self) -> u64 {
        self.failures.value()
    }

    fn short_circuited(&self) -> u64 {
        self.short_circuits.value()
    }

    /// Failures plus short-circuits
    fn errors(&self) -> u64 {
        self.failures() + self.short_circuited()
    }

    fn total(&self) -> u64 {
        self.successes() + self.failures() + self.short_circuited()
    }

    /// Zero all three tallies; used when a ring slot is recycled
    fn reset(&self) {
        self.successes.reset();
        self.failures.reset();
        self.short_circuits.reset();
    }
}

/// Ring state shared between window handles and the rollover task
#[derive(Debug)]
struct Ring {
    buckets: Box<[Bucket]>,
    /// Index of the bucket new outcomes are recorded into. Recorders and
    /// aggregate reads take the lock shared; rollover and reset take it
    /// exclusively.
    cursor: RwLock<usize>,
    /// Rollovers performed since construction, for observability
    rollovers: AtomicUsize,
}

impl Ring {
    fn new(buckets: usize) -> Self {
        Self {
            buckets: (0..buckets).map(|_| Bucket::default()).collect(),
            cursor: RwLock::new(0),
            rollovers: AtomicUsize::new(0),
        }
    }

    /// Advance the cursor to the next slot and clear it.
    ///
    /// Runs under the exclusive lock so no recorder can write into a bucket
    /// mid-recycle.
    fn roll(&self) {
        let mut cursor = self.cursor.write().unwrap();
        *cursor = (*cursor + 1) % self.buckets.len();
        self.buckets[*cursor].reset();
        self.rollovers.fetch_add(1, Ordering::Relaxed);
    }

    fn current<R>(&self, record: impl FnOnce(&Bucket) -> R) -> R {
        let cursor = self.cursor.read().unwrap();
        record(&self.buckets[*cursor])
    }

    fn scan(&self, mut per_bucket: impl FnMut(&Bucket) -> u64) -> u64 {
        let _cursor = self.cursor.read().unwrap();
        self.buckets.iter().map(&mut per_bucket).sum()
    }
}

/// A rolling window of outcome statistics over a fixed total duration.
///
/// `Window` is a cheap `Clone` handle over shared ring state; clones observe
/// and record into the same statistics. One background rollover task runs per
/// window, started at construction; it stops when [`Window::shutdown`] is
/// called or when the last handle is dropped.
///
/// Construction fails unless the total duration splits into whole,
/// equal-length bucket slices — that guarantee is what gives "errors over the
/// last N buckets" a well-defined, equal-weighted meaning.
#[derive(Debug, Clone)]
pub struct Window {
    ring: Arc<Ring>,
    shutdown: Arc<watch::Sender<()>>,
}

impl Window {
    /// Create a window of `buckets` slices spanning `duration` in total, and
    /// start its background rollover task.
    ///
    /// Must be called within a tokio runtime. Fails with [`ConfigError`] when
    /// `buckets` is zero, `duration` is zero, or `duration` does not divide
    /// evenly into `buckets` whole slices.
    ///
    /// # Example
    /// ```no_run
    /// use breakwater::Window;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// assert!(Window::new(10, Duration::from_secs(10)).is_ok());
    /// assert!(Window::new(11, Duration::from_secs(10)).is_err());
    /// # }
    /// ```
    pub fn new(buckets: usize, duration: Duration) -> Result<Self, ConfigError> {
        if buckets == 0 {
            return Err(ConfigError::ZeroBuckets);
        }
        if duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if duration.as_nanos() % buckets as u128 != 0 {
            return Err(ConfigError::UnevenBuckets { buckets, duration });
        }

        let slice = Duration::from_nanos((duration.as_nanos() / buckets as u128) as u64);
        let ring = Arc::new(Ring::new(buckets));
        let (tx, rx) = watch::channel(());

        tokio::spawn(rollover_loop(Arc::downgrade(&ring), slice, rx));

        Ok(Self {
            ring,
            shutdown: Arc::new(tx),
        })
    }

    /// Record a successful operation into the current bucket
    pub(crate) fn mark_success(&self) {
        self.ring.current(Bucket::mark_success);
    }

    /// Record a failed operation into the current bucket
    pub(crate) fn mark_failure(&self) {
        self.ring.current(Bucket::mark_failure);
    }

    /// Record a short-circuited (rejected without attempting) operation into
    /// the current bucket
    pub(crate) fn mark_short_circuited(&self) {
        self.ring.current(Bucket::mark_short_circuited);
    }

    /// Total outcomes (successes, failures and short-circuits) across the
    /// whole window
    pub fn total(&self) -> u64 {
        self.ring.scan(Bucket::total)
    }

    /// Error percentage across the whole window, as a rounded 0–100 integer.
    ///
    /// Failures and short-circuits both count as errors. A window with no
    /// traffic reports 0% — a deliberate floor, not "unknown".
    pub fn error_rate(&self) -> u64 {
        // Single scan so errors and total come from the same pass
        let _cursor = self.ring.cursor.read().unwrap();
        let mut errors = 0u64;
        let mut total = 0u64;
        for bucket in self.ring.buckets.iter() {
            errors += bucket.errors();
            total += bucket.total();
        }
        if total == 0 {
            return 0;
        }
        ((errors as f64 / total as f64) * 100.0).round() as u64
    }

    /// Total successes across the whole window
    pub fn successes(&self) -> u64 {
        self.ring.scan(Bucket::successes)
    }

    /// Total failures across the whole window
    pub fn failures(&self) -> u64 {
        self.ring.scan(Bucket::failures)
    }

    /// Total short-circuits across the whole window
    pub fn short_circuited(&self) -> u64 {
        self.ring.scan(Bucket::short_circuited)
    }

    /// Clear every bucket immediately, independent of the tick schedule.
    ///
    /// Used when a breaker opens, so a later probe starts from a clean slate
    /// instead of stale pre-trip statistics.
    pub fn reset(&self) {
        let _cursor = self.ring.cursor.write().unwrap();
        for bucket in self.ring.buckets.iter() {
            bucket.reset();
        }
    }

    /// Number of buckets in the ring
    pub fn buckets(&self) -> usize {
        self.ring.buckets.len()
    }

    /// Stop the background rollover task.
    ///
    /// Recording and aggregation keep working after shutdown, but statistics
    /// no longer age out. The task also stops on its own when the last
    /// `Window` handle is dropped.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Background rollover loop: one per window.
///
/// Holds only a weak reference to the ring so a dropped window is never kept
/// alive by its own ticker. Exits on the shutdown signal, when every sender
/// handle is gone, or when the ring itself has been dropped.
async fn rollover_loop(ring: Weak<Ring>, slice: Duration, mut shutdown: watch::Receiver<()>) {
    let mut ticker = tokio::time::interval(slice);
    // The first tick completes immediately; consume it so rollovers start
    // one full slice after construction.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match ring.upgrade() {
                    Some(ring) => {
                        ring.roll();
                        trace!(rollovers = ring.rollovers.load(Ordering::Relaxed), "window rolled over");
                    }
                    None => break,
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    trace!("window rollover task stopped");
}
