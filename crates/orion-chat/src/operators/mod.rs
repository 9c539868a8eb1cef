//! Timing operators driven by the orchestrator loop.
//!
//! Each one is a small state machine holding a pending buffer and, where it
//! needs one, a deadline. None of them own a timer: the loop asks for the
//! next deadline, sleeps until it, and hands the current [`Instant`] back in.
//! That keeps every operator testable with hand-built instants.
//!
//! [`Instant`]: tokio::time::Instant

mod batch;
mod debounce;
mod exhaust;
mod sampler;
mod throttle;

pub use batch::BatchWindow;
pub use debounce::Debouncer;
pub use exhaust::ExhaustGate;
pub use sampler::Sampler;
pub use throttle::Throttle;

use tokio::time::Instant;

/// Sleep until `deadline`, or forever when there is none.
///
/// Used as a `select!` arm so an idle operator never wakes the loop.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
