use crate::error::ExhaustedRetries;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry around a fallible async operation.
///
/// Page navigation retries immediately; remote calls wait `delay` between
/// attempts. The policy never decides whether exhaustion is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 3;

    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Runs `op` until it succeeds or the attempt budget is spent.
    ///
    /// A budget of zero still makes one attempt.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<T, ExhaustedRetries<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(operation, attempt, attempts, error = %e, "attempt failed");
                    if attempt >= attempts {
                        return Err(ExhaustedRetries {
                            operation: operation.to_string(),
                            attempts,
                            last_error: e,
                        });
                    }
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate(Self::DEFAULT_ATTEMPTS)
    }
}
