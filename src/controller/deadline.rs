//! Call-budget deadline for the validation phase

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Absolute deadline threaded through every blocking call of the
/// validation phase. Calls made after expiry fail immediately.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Run `call` with whatever budget is left, dropping it on expiry
    pub async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_expired() {
            return Err(Error::Timeout(self.budget));
        }
        tokio::time::timeout(self.remaining(), call)
            .await
            .map_err(|_| Error::Timeout(self.budget))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_within_budget() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let value = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(42)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(deadline.remaining(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_abandons_slow_call() {
        let deadline = Deadline::after(Duration::from_secs(2));
        let result: Result<()> = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_fails_fast() {
        let deadline = Deadline::after(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        let result = deadline.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
