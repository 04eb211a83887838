/// Debounce, throttle and duration tracking for async operations.
///
/// All three use tokio's clock, so tests can drive them with a paused runtime.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Runs only the last of a burst of calls per key.
#[derive(Debug, Default)]
pub struct Debouncer {
    generations: Mutex<HashMap<String, u64>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, key: &str) -> u64 {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, key: &str, generation: u64) -> bool {
        self.generations
            .lock()
            .map(|generations| generations.get(key) == Some(&generation))
            .unwrap_or(false)
    }

    /// Wait `delay`, then run `op` unless a later call for the same key
    /// arrived meanwhile. A superseded call yields `None` and never runs.
    pub async fn debounce<T, F, Fut>(&self, key: &str, delay: Duration, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.bump(key);
        tokio::time::sleep(delay).await;
        if !self.is_current(key, generation) {
            log::trace!(target: "taskboard.resilience", "Debounced call for '{}' superseded", key);
            return None;
        }
        Some(op().await)
    }

    /// Drop any pending call for `key`.
    pub fn cancel(&self, key: &str) {
        self.bump(key);
    }
}

/// Drops calls that arrive within `interval` of the last executed one.
#[derive(Debug, Default)]
pub struct Throttler {
    last_run: Mutex<HashMap<String, Instant>>,
}

impl Throttler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn throttle<T, F, Fut>(&self, key: &str, interval: Duration, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        {
            let mut last_run = self
                .last_run
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            if let Some(last) = last_run.get(key) {
                if now.duration_since(*last) < interval {
                    log::trace!(target: "taskboard.resilience", "Throttled call for '{}'", key);
                    return None;
                }
            }
            last_run.insert(key.to_string(), now);
        }
        Some(op().await)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub operation: String,
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    pub last_execution: DateTime<Utc>,
}

impl PerformanceMetrics {
    fn first(operation: &str, duration: Duration) -> Self {
        Self {
            operation: operation.to_string(),
            count: 1,
            total: duration,
            min: duration,
            max: duration,
            last_execution: Utc::now(),
        }
    }

    fn add(&mut self, duration: Duration) {
        self.count += 1;
        self.total = self.total.saturating_add(duration);
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
        self.last_execution = Utc::now();
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Default)]
pub struct PerformanceTracker {
    metrics: Mutex<HashMap<String, PerformanceMetrics>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, operation: &str, duration: Duration) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics
                .entry(operation.to_string())
                .and_modify(|m| m.add(duration))
                .or_insert_with(|| PerformanceMetrics::first(operation, duration));
        }
    }

    /// Await `fut` and record how long it took.
    pub async fn measure<T>(&self, operation: &str, fut: impl Future<Output = T>) -> T {
        let started = Instant::now();
        let out = fut.await;
        self.track(operation, started.elapsed());
        out
    }

    pub fn metrics(&self, operation: &str) -> Option<PerformanceMetrics> {
        self.metrics
            .lock()
            .ok()
            .and_then(|metrics| metrics.get(operation).cloned())
    }

    pub fn all(&self) -> Vec<PerformanceMetrics> {
        let mut all: Vec<PerformanceMetrics> = self
            .metrics
            .lock()
            .map(|metrics| metrics.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.operation.cmp(&b.operation));
        all
    }

    pub fn clear(&self) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_average_handles_counts_beyond_u32() {
        let count = u64::from(u32::MAX) + 1;
        let metrics = PerformanceMetrics {
            count,
            total: Duration::from_secs(count * 2),
            ..PerformanceMetrics::first("op", Duration::ZERO)
        };
        assert_eq!(metrics.average(), Duration::from_secs(2));

        let mut metrics = PerformanceMetrics::first("op", Duration::MAX);
        metrics.add(Duration::from_secs(1));
        assert_eq!(metrics.total, Duration::MAX);
        assert_eq!(metrics.count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_runs_only_last_call() {
        let debouncer = Debouncer::new();
        let runs = AtomicU32::new(0);
        let runs = &runs;
        let delay = Duration::from_millis(300);

        let (first, second) = tokio::join!(
            debouncer.debounce("save", delay, || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                1
            }),
            debouncer.debounce("save", delay, || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                2
            }),
        );
        assert_eq!(first, None);
        assert_eq!(second, Some(2));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_keys_are_independent() {
        let debouncer = Debouncer::new();
        let delay = Duration::from_millis(300);
        let (a, b) = tokio::join!(
            debouncer.debounce("a", delay, || async { "a" }),
            debouncer.debounce("b", delay, || async { "b" }),
        );
        assert_eq!((a, b), (Some("a"), Some("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_cancel() {
        let debouncer = Debouncer::new();
        let delay = Duration::from_millis(300);
        let (result, _) = tokio::join!(
            debouncer.debounce("save", delay, || async { 1 }),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                debouncer.cancel("save");
            }
        );
        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_drops_early_calls() {
        let throttler = Throttler::new();
        let interval = Duration::from_millis(1000);
        assert_eq!(throttler.throttle("t", interval, || async { 1 }).await, Some(1));
        assert_eq!(throttler.throttle("t", interval, || async { 2 }).await, None);
        assert_eq!(throttler.throttle("u", interval, || async { 3 }).await, Some(3));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(throttler.throttle("t", interval, || async { 4 }).await, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_performance_tracker() {
        let tracker = PerformanceTracker::new();
        tracker.track("load", Duration::from_millis(10));
        tracker.track("load", Duration::from_millis(30));
        let value = tracker
            .measure("save", async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                7
            })
            .await;
        assert_eq!(value, 7);

        let load = tracker.metrics("load").unwrap();
        assert_eq!(load.count, 2);
        assert_eq!(load.min, Duration::from_millis(10));
        assert_eq!(load.max, Duration::from_millis(30));
        assert_eq!(load.average(), Duration::from_millis(20));
        assert_eq!(tracker.metrics("save").unwrap().total, Duration::from_millis(50));
        assert_eq!(tracker.all().len(), 2);

        tracker.clear();
        assert!(tracker.metrics("load").is_none());
    }
}
