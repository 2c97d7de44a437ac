//! Retry policy for private exchange calls

use super::{Balance, ErrorClass, ExchangeApi, ExchangeError, Order, OrderResult};
use crate::notify::Notifier;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Linear-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `delay * n` before the next try
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Terminal failures and exhaustion notify the operator before the error
    /// is returned.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        notifier: &dyn Notifier,
        mut op: F,
    ) -> Result<T, ExchangeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if err.class() == ErrorClass::Terminal {
                tracing::warn!(label, error = %err, "Terminal exchange error, not retrying");
                notifier
                    .notify_operator(&format!("{} failed: {}", label, err))
                    .await;
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::error!(label, attempts = attempt, error = %err, "Retries exhausted");
                notifier
                    .notify_operator(&format!(
                        "{} failed after {} attempts: {}",
                        label, attempt, err
                    ))
                    .await;
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Exchange call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Applies a [`RetryPolicy`] to the private calls of an exchange client
pub struct Retrying<E> {
    inner: E,
    policy: RetryPolicy,
    notifier: Arc<dyn Notifier>,
}

impl<E: ExchangeApi> Retrying<E> {
    pub fn new(inner: E, policy: RetryPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner,
            policy,
            notifier,
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: ExchangeApi> ExchangeApi for Retrying<E> {
    async fn fetch_historical_closes(
        &self,
        pair: &str,
        interval_minutes: u32,
    ) -> Result<Vec<Decimal>, ExchangeError> {
        // A failed refresh is picked up by the next cycle
        self.inner.fetch_historical_closes(pair, interval_minutes).await
    }

    async fn fetch_balance(&self) -> Result<Balance, ExchangeError> {
        self.policy
            .run("Balance request", self.notifier.as_ref(), || {
                self.inner.fetch_balance()
            })
            .await
    }

    async fn place_order(&self, order: &Order) -> Result<OrderResult, ExchangeError> {
        let label = format!("{} order for {}", order.side, order.symbol_id);
        self.policy
            .run(&label, self.notifier.as_ref(), || self.inner.place_order(order))
            .await
    }
}
