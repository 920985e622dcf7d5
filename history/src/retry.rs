//! Throttling-aware retry policy
//!
//! A remote call is attempted up to `max_attempts` times. Only throttling
//! errors are retried. Every throttled attempt `n` is followed by a wait of
//! `n * base_delay` (200ms, 400ms, 600ms with the defaults), capped at
//! `max_delay_ms` and optionally widened by jitter. The wait after the last
//! attempt is still taken before the call gives up.
//!
//! The loop is driven by [`RetryState`] transitions so the attempt count and
//! the delay schedule can be checked without sleeping:
//!
//! ```
//! use history::retry::{RetryPolicy, RetryState};
//! use provider::ProviderError;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! let throttled = || ProviderError::Throttling { message: "Rate exceeded".to_string() };
//!
//! assert!(matches!(
//!     policy.on_throttled(1, throttled()),
//!     RetryState::BackingOff { attempt: 1, delay, last_error: None }
//!         if delay == Duration::from_millis(200)
//! ));
//!
//! let last = policy.on_throttled(3, throttled());
//! assert!(matches!(
//!     last,
//!     RetryState::BackingOff { attempt: 3, delay, last_error: Some(_) }
//!         if delay == Duration::from_millis(600)
//! ));
//! assert!(matches!(
//!     policy.after_backoff(last),
//!     RetryState::Exhausted { attempts: 3, .. }
//! ));
//! ```

use crate::error::RetryError;
use async_trait::async_trait;
use provider::{ProviderError, ProviderResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `n` is `n * base_delay_ms`
    pub base_delay_ms: u64,
    /// Upper bound for a single wait
    pub max_delay_ms: u64,
    /// Extra random delay as a fraction of the computed delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
            jitter_factor: 0.0,
        }
    }
}

/// Where a retried call currently stands.
#[derive(Debug)]
pub enum RetryState {
    Attempting {
        attempt: u32,
    },
    /// Waiting after a throttled attempt. `last_error` is set when no
    /// attempts remain, so the wait ends in [`RetryState::Exhausted`].
    BackingOff {
        attempt: u32,
        delay: Duration,
        last_error: Option<ProviderError>,
    },
    Exhausted { attempts: u32, last_error: ProviderError },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay_ms = base_delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = max_delay.as_millis() as u64;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Max attempts must be greater than 0".to_string());
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err("Max delay must not be smaller than the base delay".to_string());
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("Jitter factor must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    /// Delay to wait after the given (1-based) throttled attempt.
    pub fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let linear_delay = Duration::from_millis(self.base_delay_ms) * attempt;
        let delay = linear_delay.min(Duration::from_millis(self.max_delay_ms));

        if self.jitter_factor > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter = rng.gen_range(0.0..=self.jitter_factor);
            let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
            delay + Duration::from_millis(jitter_ms)
        } else {
            delay
        }
    }

    pub fn start(&self) -> RetryState {
        RetryState::Attempting { attempt: 1 }
    }

    /// Transition taken when `attempt` failed with a throttling error.
    pub fn on_throttled(&self, attempt: u32, error: ProviderError) -> RetryState {
        let last_error = (attempt >= self.max_attempts).then_some(error);
        RetryState::BackingOff {
            attempt,
            delay: self.calculate_retry_delay(attempt),
            last_error,
        }
    }

    /// Transition taken once the wait of a `BackingOff` state has elapsed.
    /// Any other state is returned unchanged.
    pub fn after_backoff(&self, state: RetryState) -> RetryState {
        match state {
            RetryState::BackingOff {
                attempt,
                last_error: Some(error),
                ..
            } => RetryState::Exhausted {
                attempts: attempt,
                last_error: error,
            },
            RetryState::BackingOff { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }
}

/// Suspends the caller between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays instead of waiting. Useful in tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(delay);
    }
}

/// A retry policy bound to the sleeper it waits with.
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `call` until it succeeds, fails with a non-throttling error, or
    /// the attempt budget is spent. `operation` and `target` label the error.
    pub async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        target: &str,
        mut call: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut state = self.policy.start();

        loop {
            state = match state {
                RetryState::Attempting { attempt } => match call().await {
                    Ok(value) => {
                        if attempt > 1 {
                            debug!("{} {} succeeded on attempt {}", operation, target, attempt);
                        }
                        return Ok(value);
                    }
                    Err(e) if e.is_throttling() => self.policy.on_throttled(attempt, e),
                    Err(e) => {
                        return Err(RetryError::Fatal {
                            operation,
                            target: target.to_string(),
                            source: e,
                        })
                    }
                },
                backoff @ RetryState::BackingOff { .. } => {
                    if let RetryState::BackingOff {
                        attempt,
                        delay,
                        last_error,
                    } = &backoff
                    {
                        if last_error.is_some() {
                            warn!(
                                "{} {} throttled on final attempt {}, waiting {:?}",
                                operation, target, attempt, delay
                            );
                        } else {
                            warn!(
                                "{} {} throttled (attempt {}/{}), retrying in {:?}",
                                operation, target, attempt, self.policy.max_attempts, delay
                            );
                        }
                        self.sleeper.sleep(*delay).await;
                    }
                    self.policy.after_backoff(backoff)
                }
                RetryState::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        "{} {} still throttled after {} attempts",
                        operation, target, attempts
                    );
                    return Err(RetryError::Exhausted {
                        operation,
                        target: target.to_string(),
                        attempts,
                        source: last_error,
                    });
                }
            };
        }
    }
}
