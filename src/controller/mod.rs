//! Failover controllers
//!
//! Both controllers share the same shape: load desired state, read cloud
//! state, then either converge (`start`) or classify (`monitor`). Nothing is
//! cached between invocations.

mod deadline;
pub mod eip;
mod executor;
pub mod plan;
pub mod route;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::MonitorMode;
use crate::error::Result;
use crate::ocf::Outcome;

pub use deadline::Deadline;
pub use eip::EipController;
pub use executor::Executor;
pub use plan::{Binding, ConvergencePlan, Mutation, SettleTarget};
pub use route::RouteController;

/// Repeat `attempt` with a fixed backoff until it succeeds or fails with an
/// error retrying cannot fix
///
/// `start` has no "not running" outcome to fall back to, so it keeps trying
/// until the cluster manager's own timeout ends the invocation.
pub async fn retry_until_valid<T, F, Fut>(backoff: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                warn!(
                    "Validation attempt {} failed, retrying in {:?}: {}",
                    attempts, backoff, e
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Downgrade transient failures of a periodic monitor to success
pub fn apply_tolerance(result: Result<Outcome>, mode: MonitorMode) -> Result<Outcome> {
    match result {
        Err(e) if mode == MonitorMode::Periodic && e.is_tolerable() => {
            warn!("Ignoring monitor failure during periodic check: {}", e);
            Ok(Outcome::Success)
        }
        other => other,
    }
}
