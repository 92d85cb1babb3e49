//! Breakwater: pure-logic circuit breaker primitives
//!
//! # Overview
//!
//! This crate wraps a risky operation in a guard that tracks its recent
//! outcomes and decides whether to allow, reject, or probe the operation.
//! It protects callers from cascading failures when a downstream dependency
//! degrades, shedding load during outages instead of queuing requests behind
//! a failing resource. It includes:
//!
//! - **Circuit Breaker**: closed/open decisioning with forced overrides and
//!   single-probe recovery after a reset timeout
//! - **Window**: a fixed ring of time buckets providing sliding-window
//!   failure-rate statistics, aged out by a background rollover task
//! - **Counter**: an atomic monotonic counter with reset-and-return semantics
//! - **Command**: a unit-of-work/fallback pair executed through a breaker
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Network protocols or the dependency being guarded
//! - Retry policies (the caller decides whether and when to call again)
//! - Cross-process coordination (all statistics are local to the process)
//!
//! The caller classifies outcomes: the breaker never inspects errors itself,
//! it only acts on the successes, failures and short-circuits reported back
//! to it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │ allow()?
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← admit / reject / probe
//! │  (open & forced flags, reset timeout)   │
//! └─────────────┬───────────────────────────┘
//!               │ thresholds vs statistics
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Sliding Window                    │  ← ring of time buckets
//! │  (rollover task ages out old outcomes)  │
//! └─────────────────────────────────────────┘
//!               ▲
//!               │ mark_success / mark_failure / mark_short_circuited
//!               │
//!         Outcome reports from the caller
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use breakwater::{BreakerConfig, CircuitBreaker, Window};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), breakwater::ConfigError> {
//!     // Ten one-second buckets over the last ten seconds
//!     let window = Window::new(10, Duration::from_secs(10))?;
//!
//!     let breaker = CircuitBreaker::new(
//!         BreakerConfig {
//!             error_threshold: 50,   // trip at 50% errors...
//!             volume_threshold: 20,  // ...once 20 outcomes are in the window
//!             reset_timeout: Duration::from_secs(30),
//!         },
//!         window,
//!     );
//!
//!     if breaker.allow() {
//!         let result = call_dependency().await;
//!         breaker.record(&result);
//!     } else {
//!         // Shed load: the dependency is considered down
//!     }
//!     Ok(())
//! }
//! # async fn call_dependency() -> Result<(), ()> { Ok(()) }
//! ```

pub mod breaker;
pub mod command;
pub mod counter;
pub mod error;
pub mod window;

// Re-export main types for convenience
pub use breaker::{BreakerConfig, CircuitBreaker};
pub use command::{execute, Command};
pub use counter::Counter;
pub use error::ConfigError;
pub use window::Window;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use breakwater::prelude::*;
/// ```
pub mod prelude {
    pub use super::breaker::{BreakerConfig, CircuitBreaker};
    pub use super::command::{execute, Command};
    pub use super::counter::Counter;
    pub use super::error::ConfigError;
    pub use super::window::Window;
}
