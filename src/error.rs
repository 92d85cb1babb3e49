//! Error types for window construction
//!
//! Construction is the only fallible operation in this crate. Every other
//! method is a total function over always-valid in-memory state.

use std::time::Duration;
use thiserror::Error;

/// Configuration error raised by [`Window::new`](crate::Window::new).
///
/// The window requires a positive bucket count and a total duration that
/// splits into whole, equal-length bucket slices. Anything else would leave
/// the per-bucket statistics unevenly weighted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The window was requested with zero buckets
    #[error("window must contain at least one bucket")]
    ZeroBuckets,

    /// The window was requested with a zero total duration
    #[error("window duration must be non-zero")]
    ZeroDuration,

    /// The total duration does not divide evenly into the bucket count
    #[error("window of {duration:?} does not split evenly into {buckets} buckets")]
    UnevenBuckets {
        /// Requested bucket count
        buckets: usize,
        /// Requested total window duration
        duration: Duration,
    },
}
