//! Retry, fallback and circuit-breaker wrappers around fallible async work.
//!
//! Domain errors (not found, validation, bad arguments) describe the request
//! itself and pass through every wrapper untouched. Everything else counts as
//! a failure of the underlying service.

pub mod breaker;
pub mod stats;
pub mod timing;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::config::{CircuitBreakerConfig, CoreConfig, RetryConfig};
use crate::error::{KanbanError, Result};
use crate::feedback::Notifier;

pub use breaker::CircuitState;
use breaker::{Admission, Breaker};
pub use stats::{ErrorStatistics, StatsTable};
pub use timing::{Debouncer, PerformanceMetrics, PerformanceTracker, Throttler};

const RETRY_WARNING_DURATION: Duration = Duration::from_millis(2000);
const FALLBACK_WARNING_DURATION: Duration = Duration::from_millis(3000);
const JITTER_RATIO: f64 = 0.1;

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Uniform value in `[0, 1]` from a hash of a counter and the clock.
fn jitter_fraction() -> f64 {
    let seq = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(ts.to_le_bytes());
    let hash = hasher.finalize();
    let sample = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]);
    sample as f64 / u32::MAX as f64
}

/// `base * 2^(attempt-1)` plus up to 10% jitter. `attempt` starts at 1.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    let delay = base.saturating_mul(factor);
    delay.saturating_add(delay.mul_f64(JITTER_RATIO * jitter_fraction()))
}

pub struct Resilience {
    retry: RetryConfig,
    breaker: CircuitBreakerConfig,
    notifier: Notifier,
    breakers: Mutex<HashMap<String, Breaker>>,
    stats: StatsTable,
    debounce_delay: Duration,
    throttle_interval: Duration,
    debouncer: Debouncer,
    throttler: Throttler,
    performance: PerformanceTracker,
}

impl Resilience {
    pub fn new(config: &CoreConfig, notifier: Notifier) -> Self {
        Self {
            retry: config.retry.clone(),
            breaker: config.circuit_breaker.clone(),
            notifier,
            breakers: Mutex::new(HashMap::new()),
            stats: StatsTable::default(),
            debounce_delay: config.debounce_delay(),
            throttle_interval: config.throttle_interval(),
            debouncer: Debouncer::new(),
            throttler: Throttler::new(),
            performance: PerformanceTracker::new(),
        }
    }

    /// Debounce `op` under `key` with the configured delay.
    pub async fn debounce<T, F, Fut>(&self, key: &str, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.debouncer.debounce(key, self.debounce_delay, op).await
    }

    /// Throttle `op` under `key` with the configured interval.
    pub async fn throttle<T, F, Fut>(&self, key: &str, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.throttler.throttle(key, self.throttle_interval, op).await
    }

    pub fn performance(&self) -> &PerformanceTracker {
        &self.performance
    }

    /// Run `op` up to `max_retries + 1` times with exponential backoff.
    pub async fn execute_with_retry<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.retry.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            log::debug!(
                target: "taskboard.resilience",
                "{}: attempt {}/{}",
                name,
                attempt,
                attempts
            );
            let error = match op().await {
                Ok(value) => {
                    self.stats.record_success(name);
                    if attempt > 1 {
                        log::info!(
                            target: "taskboard.resilience",
                            "{} succeeded after {} attempt(s)",
                            name,
                            attempt
                        );
                        self.notifier
                            .success(format!(
                                "Operation '{}' succeeded after {} attempt(s)!",
                                name, attempt
                            ))
                            .await;
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            self.stats.record_failure(name, &error);
            if error.is_domain() {
                return Err(error);
            }
            log::warn!(
                target: "taskboard.resilience",
                "{} failed on attempt {}/{}: {}",
                name,
                attempt,
                attempts,
                error
            );

            if attempt >= attempts {
                self.notifier
                    .error(format!(
                        "Operation '{}' failed after {} attempts.",
                        name, attempts
                    ))
                    .await;
                return Err(KanbanError::OperationFailed {
                    operation: name.to_string(),
                    attempts,
                    source: Box::new(error),
                });
            }

            let delay = backoff_delay(self.retry.base_delay(), attempt);
            self.notifier
                .warning_for(
                    format!("Attempt {} failed. Retrying...", attempt),
                    RETRY_WARNING_DURATION,
                )
                .await;
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `op`; if it fails, run `fallback` instead.
    pub async fn execute_with_fallback<T, F, Fut, G, GFut>(
        &self,
        name: &str,
        op: F,
        fallback: G,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        let primary = match op().await {
            Ok(value) => {
                self.stats.record_success(name);
                return Ok(value);
            }
            Err(e) => e,
        };
        self.stats.record_failure(name, &primary);
        log::warn!(
            target: "taskboard.resilience",
            "{} failed, running fallback: {}",
            name,
            primary
        );
        self.notifier
            .warning_for(
                format!("Using alternative method for '{}'...", name),
                FALLBACK_WARNING_DURATION,
            )
            .await;

        match fallback().await {
            Ok(value) => {
                self.notifier
                    .info(format!(
                        "Operation '{}' completed using an alternative method.",
                        name
                    ))
                    .await;
                Ok(value)
            }
            Err(fallback_error) => {
                log::error!(
                    target: "taskboard.resilience",
                    "{} fallback failed too: {}",
                    name,
                    fallback_error
                );
                self.notifier
                    .error(format!(
                        "Both the operation and its fallback failed for '{}'.",
                        name
                    ))
                    .await;
                Err(KanbanError::FallbackFailed {
                    operation: name.to_string(),
                    primary: Box::new(primary),
                    fallback: Box::new(fallback_error),
                })
            }
        }
    }

    /// Run `op` behind the circuit breaker named `name`.
    pub async fn execute_with_circuit_breaker<T, F, Fut>(&self, name: &str, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admission = self.with_breaker(name, |breaker| breaker.admit(Instant::now()));
        match admission {
            Admission::Rejected { retry_in } => {
                log::warn!(
                    target: "taskboard.resilience",
                    "Circuit '{}' is open, rejecting call (retry in {:?})",
                    name,
                    retry_in
                );
                self.notifier
                    .warning(format!(
                        "Service '{}' is temporarily unavailable. Try again in a few moments.",
                        name
                    ))
                    .await;
                return Err(KanbanError::CircuitOpen(name.to_string()));
            }
            Admission::Trial => {
                log::info!(target: "taskboard.resilience", "Circuit '{}' half-open, trying", name);
            }
            Admission::Allowed => {}
        }

        match op().await {
            Ok(value) => {
                if self.with_breaker(name, Breaker::on_success) {
                    log::info!(target: "taskboard.resilience", "Circuit '{}' closed", name);
                }
                Ok(value)
            }
            Err(error) if error.is_domain() => Err(error),
            Err(error) => {
                let threshold = self.breaker.failure_threshold;
                let timeout = self.breaker.open_timeout();
                let (opened, failures) = self.with_breaker(name, |breaker| {
                    let opened = breaker.on_failure(Instant::now(), threshold, timeout);
                    (opened, breaker.failures())
                });
                log::warn!(
                    target: "taskboard.resilience",
                    "Circuit '{}' recorded failure {}: {}",
                    name,
                    failures,
                    error
                );
                if opened {
                    log::warn!(
                        target: "taskboard.resilience",
                        "Circuit '{}' opened after {} failure(s)",
                        name,
                        failures
                    );
                    self.notifier
                        .error(format!(
                            "Service '{}' is temporarily unavailable after repeated failures.",
                            name
                        ))
                        .await;
                }
                Err(error)
            }
        }
    }

    fn with_breaker<R>(&self, name: &str, f: impl FnOnce(&mut Breaker) -> R) -> R {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(breakers.entry(name.to_string()).or_default())
    }

    pub fn circuit_state(&self, name: &str) -> CircuitState {
        self.with_breaker(name, |breaker| breaker.state())
    }

    /// Statistics for one operation, or the aggregate over all of them.
    pub fn statistics(&self, name: Option<&str>) -> ErrorStatistics {
        match name {
            Some(name) => self.stats.get(name),
            None => self.stats.aggregate(),
        }
    }

    pub fn clear_statistics(&self) {
        self.stats.clear();
    }

    pub fn is_operation_healthy(&self, name: &str) -> bool {
        self.stats.get(name).is_healthy()
    }
}
