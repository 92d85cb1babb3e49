//! Command execution against a circuit breaker
//!
//! Thin orchestration over the breaker contract: a [`Command`] pairs a unit
//! of work with a fallback value, and [`execute`] runs it only when the
//! breaker allows, reporting the outcome back. Rejected work never touches
//! the guarded dependency — the caller gets the fallback and the rejection is
//! recorded as a short-circuit.

use crate::breaker::CircuitBreaker;
use async_trait::async_trait;

/// A unit of work plus the value to substitute when it is rejected or fails.
///
/// # Example
/// ```no_run
/// use breakwater::{Command, CircuitBreaker, Window};
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// struct FetchGreeting;
///
/// #[async_trait]
/// impl Command for FetchGreeting {
///     type Output = String;
///     type Error = std::io::Error;
///
///     async fn run(&self) -> Result<String, std::io::Error> {
///         // Call the flaky dependency here
///         Ok("hello".to_string())
///     }
///
///     fn fallback(&self) -> String {
///         "hello (cached)".to_string()
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), breakwater::ConfigError> {
///     let window = Window::new(10, Duration::from_secs(10))?;
///     let breaker = CircuitBreaker::new_default(window);
///
///     let greeting = breakwater::execute(&FetchGreeting, &breaker).await;
///     println!("{greeting}");
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Command: Send + Sync {
    /// Value produced by the work (and by the fallback)
    type Output: Send;
    /// Failure indicator reported back to the breaker
    type Error: Send;

    /// Attempt the guarded operation
    async fn run(&self) -> Result<Self::Output, Self::Error>;

    /// Value substituted when the operation is rejected or fails
    fn fallback(&self) -> Self::Output;
}

/// Execute a command against a circuit breaker.
///
/// When the breaker allows the call, the command runs: a success is recorded
/// and its value returned; a failure is recorded and the fallback returned.
/// When the breaker rejects the call, a short-circuit is recorded and the
/// fallback returned without attempting the operation.
///
/// This function has no state of its own.
pub async fn execute<C: Command>(command: &C, breaker: &CircuitBreaker) -> C::Output {
    if breaker.allow() {
        match command.run().await {
            Ok(output) => {
                breaker.mark_success();
                output
            }
            Err(_) => {
                breaker.mark_failure();
                command.fallback()
            }
        }
    } else {
        breaker.mark_short_circuited();
        command.fallback()
    }
}
