//! Circuit breaker state machine
//!
//! The breaker guards a risky operation: callers ask [`CircuitBreaker::allow`]
//! before attempting it and report the outcome back afterwards. Decisions are
//! driven by the sliding [`Window`] statistics plus two operator overrides
//! (forced-open and forced-closed).
//!
//! # States
//!
//! - **Closed**: traffic flows, statistics accumulate. Trips open when the
//!   window shows `total >= volume_threshold` and `error_rate >=
//!   error_threshold`.
//! - **Open**: traffic is rejected. Once `reset_timeout` elapses, exactly one
//!   caller is admitted as a probe; the half-open phase is that single
//!   compare-and-swap, not a separate state.
//! - **Forced open / forced closed**: operator override. The verdict is
//!   pinned regardless of statistics until explicitly undone.
//!
//! An open breaker never transitions on its own: the timeout is checked
//! lazily on the next `allow` call, and a breaker that is tripped and never
//! probed again stays open until an explicit `close`.

use crate::window::Window;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for circuit breaker decisioning
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Window error percentage (0–100) at or above which the breaker trips
    pub error_threshold: u64,
    /// Minimum number of outcomes in the window before the error threshold
    /// is consulted; below this volume the breaker never trips
    pub volume_threshold: u64,
    /// How long an open breaker rejects traffic before admitting a probe
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: 50,
            volume_threshold: 20,
            reset_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    config: BreakerConfig,
    window: Window,
    /// Anchor for the opened-at timestamp arithmetic
    epoch: Instant,
    /// Nanoseconds since `epoch` at which the breaker last opened (or last
    /// admitted a probe). Meaningful only while `open` is true.
    opened_at: AtomicU64,
    open: AtomicBool,
    forced: AtomicBool,
}

/// Circuit breaker over a sliding statistical window.
///
/// `CircuitBreaker` is a cheap `Clone` handle over shared state; clones
/// decide and record against the same circuit. Every method is safe under
/// arbitrary concurrent invocation and returns immediately — there is no
/// internal blocking or retrying.
///
/// The breaker's flags are independent atomics, so a reader racing an
/// explicit transition can observe a transient combination; externally
/// visible state is eventually consistent within a few atomic operations,
/// not a single snapshot.
///
/// # Example
/// ```no_run
/// use breakwater::{BreakerConfig, CircuitBreaker, Window};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), breakwater::ConfigError> {
///     let window = Window::new(10, Duration::from_secs(10))?;
///     let breaker = CircuitBreaker::new(
///         BreakerConfig {
///             error_threshold: 40,
///             volume_threshold: 5,
///             reset_timeout: Duration::from_secs(30),
///         },
///         window,
///     );
///
///     if breaker.allow() {
///         match dangerous_stuff().await {
///             Ok(_) => breaker.mark_success(),
///             Err(_) => breaker.mark_failure(),
///         }
///     }
///     Ok(())
/// }
/// # async fn dangerous_stuff() -> Result<(), ()> { Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: Arc<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed, non-forced state over the given window
    pub fn new(config: BreakerConfig, window: Window) -> Self {
        Self {
            state: Arc::new(BreakerState {
                config,
                window,
                epoch: Instant::now(),
                opened_at: AtomicU64::new(0),
                open: AtomicBool::new(false),
                forced: AtomicBool::new(false),
            }),
        }
    }

    /// Create a breaker with the default configuration
    pub fn new_default(window: Window) -> Self {
        Self::new(BreakerConfig::default(), window)
    }

    /// Decide whether a call may proceed.
    ///
    /// Forced breakers return the pinned verdict. An open breaker rejects
    /// until `reset_timeout` has elapsed since it opened, then admits exactly
    /// one concurrent caller as a probe. A closed breaker evaluates the
    /// window against the configured thresholds and trips itself open
    /// (rejecting this call) when both are met.
    pub fn allow(&self) -> bool {
        if self.is_forced() {
            return !self.state.open.load(Ordering::SeqCst);
        }
        if self.state.open.load(Ordering::SeqCst) {
            return self.try_probe();
        }

        let window = &self.state.window;
        if window.total() >= self.state.config.volume_threshold
            && window.error_rate() >= self.state.config.error_threshold
        {
            warn!(
                error_rate = window.error_rate(),
                error_threshold = self.state.config.error_threshold,
                "error threshold exceeded, tripping circuit open"
            );
            self.open();
            return false;
        }
        true
    }

    /// Admit at most one probe per elapsed reset timeout.
    ///
    /// The compare-and-swap on the opened-at timestamp guarantees exactly one
    /// winner among concurrent callers racing past the timeout boundary;
    /// losers still see the circuit as open.
    fn try_probe(&self) -> bool {
        let opened_at = self.state.opened_at.load(Ordering::SeqCst);
        let timeout = self.state.config.reset_timeout.as_nanos() as u64;
        let now = self.now_nanos();

        if now < opened_at.saturating_add(timeout) {
            return false;
        }

        let admitted = self
            .state
            .opened_at
            .compare_exchange(opened_at, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if admitted {
            debug!("reset timeout elapsed, admitting probe");
        }
        admitted
    }

    /// Record a successful operation.
    ///
    /// A success observed while open (necessarily the admitted probe)
    /// immediately restores the closed state, unless the breaker is forced.
    pub fn mark_success(&self) {
        self.state.window.mark_success();
        if !self.is_forced() && self.state.open.load(Ordering::SeqCst) {
            debug!("probe succeeded, closing circuit");
            self.close();
        }
    }

    /// Record a failed operation.
    ///
    /// Recording alone never changes the open/closed state; state changes on
    /// the next `allow` evaluation against fresh statistics.
    pub fn mark_failure(&self) {
        self.state.window.mark_failure();
    }

    /// Record a call rejected without attempting the operation.
    ///
    /// Counts as an error in the window's error percentage.
    pub fn mark_short_circuited(&self) {
        self.state.window.mark_short_circuited();
    }

    /// Record a `Result` outcome: `Ok` as a success, `Err` as a failure
    pub fn record<T, E>(&self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.mark_success(),
            Err(_) => self.mark_failure(),
        }
    }

    /// Reports whether the circuit is open
    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Reports whether the circuit is closed
    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// Reports whether the circuit is pinned by a forced transition
    pub fn is_forced(&self) -> bool {
        self.state.forced.load(Ordering::SeqCst)
    }

    /// Open the circuit: discard window statistics, clear any forced pin,
    /// stamp the trip instant and start rejecting traffic
    pub fn open(&self) {
        debug!("circuit opened");
        self.state.window.reset();
        self.state.forced.store(false, Ordering::SeqCst);
        self.state
            .opened_at
            .store(self.now_nanos(), Ordering::SeqCst);
        self.state.open.store(true, Ordering::SeqCst);
    }

    /// Close the circuit and clear any forced pin. Window statistics are
    /// left as-is.
    pub fn close(&self) {
        debug!("circuit closed");
        self.state.forced.store(false, Ordering::SeqCst);
        self.state.open.store(false, Ordering::SeqCst);
    }

    /// Open the circuit and pin it open until [`close`](Self::close) or
    /// [`force_close`](Self::force_close)
    pub fn force_open(&self) {
        self.open();
        self.state.forced.store(true, Ordering::SeqCst);
    }

    /// Close the circuit and pin it closed until [`open`](Self::open) or
    /// [`force_open`](Self::force_open)
    pub fn force_close(&self) {
        self.close();
        self.state.forced.store(true, Ordering::SeqCst);
    }

    /// The sliding window backing this breaker's decisions
    pub fn window(&self) -> &Window {
        &self.state.window
    }

    fn now_nanos(&self) -> u64 {
        self.state.epoch.elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    fn test_window() -> Window {
        Window::new(10, Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_trips_when_both_thresholds_met() {
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                error_threshold: 40,
                volume_threshold: 0,
                reset_timeout: Duration::from_secs(30),
            },
            test_window(),
        );

        for _ in 0..4 {
            assert!(breaker.allow());
            breaker.mark_success();
        }
        assert!(breaker.is_closed());

        for _ in 0..4 {
            breaker.mark_failure();
        }
        assert_eq!(breaker.window().error_rate(), 50);
        assert_eq!(breaker.window().total(), 8);

        // Next evaluation trips the circuit and rejects the call
        assert!(!breaker.allow());
        assert!(breaker.is_open());
    }

    #[tokio::test]
    async fn test_no_trip_below_volume_threshold() {
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                error_threshold: 50,
                volume_threshold: 10,
                reset_timeout: Duration::from_secs(30),
            },
            test_window(),
        );

        // 100% errors but too little traffic to judge
        for _ in 0..9 {
            breaker.mark_failure();
        }
        assert!(breaker.allow());
        assert!(breaker.is_closed());

        // One more outcome reaches the volume threshold
        breaker.mark_failure();
        assert!(!breaker.allow());
        assert!(breaker.is_open());
    }

    #[tokio::test]
    async fn test_no_trip_below_error_threshold() {
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                error_threshold: 50,
                volume_threshold: 0,
                reset_timeout: Duration::from_secs(30),
            },
            test_window(),
        );

        // 40% errors, under the 50% threshold
        for _ in 0..6 {
            breaker.mark_success();
        }
        for _ in 0..4 {
            breaker.mark_failure();
        }
        assert!(breaker.allow());
        assert!(breaker.is_closed());
    }

    #[tokio::test]
    async fn test_open_rejects_within_timeout() {
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                reset_timeout: Duration::from_secs(60),
                ..Default::default()
            },
            test_window(),
        );

        breaker.open();
        for _ in 0..10 {
            assert!(!breaker.allow());
        }
        assert!(breaker.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_admitted_after_timeout() {
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                reset_timeout: Duration::from_millis(100),
                ..Default::default()
            },
            test_window(),
        );

        breaker.open();
        assert!(!breaker.allow());

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Exactly one probe per elapsed timeout
        assert!(breaker.allow());
        assert!(!breaker.allow());
        assert!(breaker.is_open());

        // The failed probe restarted the timeout; a second one is admitted
        // after it elapses again.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(breaker.allow());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_probe_among_concurrent_callers() {
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                reset_timeout: Duration::from_millis(20),
                ..Default::default()
            },
            test_window(),
        );

        breaker.open();
        std::thread::sleep(Duration::from_millis(40));

        let admitted = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let breaker = breaker.clone();
            let admitted = Arc::clone(&admitted);
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                if breaker.allow() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_while_open_closes_circuit() {
        let breaker = CircuitBreaker::new_default(test_window());

        breaker.open();
        assert!(breaker.is_open());

        breaker.mark_success();
        assert!(breaker.is_closed());

        // A lone failure afterwards does not reopen by itself
        breaker.mark_failure();
        assert!(breaker.is_closed());
    }

    #[tokio::test]
    async fn test_force_open_pins_verdict() {
        let breaker = CircuitBreaker::new_default(test_window());

        breaker.force_open();
        assert!(breaker.is_open());
        assert!(breaker.is_forced());

        // Successes cannot close a forced-open circuit
        breaker.mark_success();
        breaker.mark_success();
        assert!(!breaker.allow());
        assert!(breaker.is_open());

        breaker.close();
        assert!(!breaker.is_forced());
        assert!(breaker.allow());
    }

    #[tokio::test]
    async fn test_force_close_pins_verdict() {
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                error_threshold: 1,
                volume_threshold: 0,
                reset_timeout: Duration::from_secs(30),
            },
            test_window(),
        );

        breaker.force_close();
        assert!(breaker.is_forced());

        for _ in 0..50 {
            breaker.mark_failure();
        }
        // Statistics scream, verdict stays pinned
        assert!(breaker.allow());
        assert!(breaker.is_closed());
    }

    #[tokio::test]
    async fn test_open_resets_window_statistics() {
        let breaker = CircuitBreaker::new_default(test_window());

        breaker.mark_failure();
        breaker.mark_failure();
        assert_eq!(breaker.window().total(), 2);

        breaker.open();
        assert_eq!(breaker.window().total(), 0);
        assert_eq!(breaker.window().error_rate(), 0);
    }

    #[tokio::test]
    async fn test_close_keeps_window_statistics() {
        let breaker = CircuitBreaker::new_default(test_window());

        breaker.mark_failure();
        breaker.close();
        assert_eq!(breaker.window().total(), 1);
    }

    #[tokio::test]
    async fn test_record_maps_results() {
        let breaker = CircuitBreaker::new_default(test_window());

        breaker.record(&Ok::<_, ()>(42));
        breaker.record(&Err::<(), _>("boom"));

        assert_eq!(breaker.window().successes(), 1);
        assert_eq!(breaker.window().failures(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_the_circuit() {
        let breaker = CircuitBreaker::new_default(test_window());
        let clone = breaker.clone();

        breaker.open();
        assert!(clone.is_open());

        clone.close();
        assert!(breaker.is_closed());
    }

    #[test]
    fn test_default_config_values() {
        let config = BreakerConfig::default();
        assert_eq!(config.error_threshold, 50);
        assert_eq!(config.volume_threshold, 20);
        assert_eq!(config.reset_timeout, Duration::from_secs(5));
    }
}
