use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Below this many samples an operation is always considered healthy.
const MIN_SAMPLES: u64 = 10;
const MAX_HEALTHY_ERROR_RATE: f64 = 0.1;
pub const AGGREGATE_NAME: &str = "All Operations";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStatistics {
    pub operation: String,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<DateTime<Utc>>,
}

impl ErrorStatistics {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            ..Self::default()
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.total < MIN_SAMPLES || self.error_rate() < MAX_HEALTHY_ERROR_RATE
    }
}

impl std::fmt::Display for ErrorStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ops, {:.1}% success rate, {:.1}% error rate",
            self.operation,
            self.total,
            self.success_rate() * 100.0,
            self.error_rate() * 100.0
        )
    }
}

/// Per-operation success/failure counters.
#[derive(Debug, Default)]
pub struct StatsTable {
    entries: Mutex<HashMap<String, ErrorStatistics>>,
}

impl StatsTable {
    fn with_entry(&self, operation: &str, update: impl FnOnce(&mut ErrorStatistics)) {
        if let Ok(mut entries) = self.entries.lock() {
            let stats = entries
                .entry(operation.to_string())
                .or_insert_with(|| ErrorStatistics::new(operation));
            update(stats);
        }
    }

    pub fn record_success(&self, operation: &str) {
        self.with_entry(operation, |stats| {
            stats.total += 1;
            stats.succeeded += 1;
        });
    }

    pub fn record_failure(&self, operation: &str, error: &dyn std::fmt::Display) {
        let message = error.to_string();
        self.with_entry(operation, |stats| {
            stats.total += 1;
            stats.failed += 1;
            stats.last_error = Some(message);
            stats.last_error_at = Some(Utc::now());
        });
    }

    pub fn get(&self, operation: &str) -> ErrorStatistics {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(operation).cloned())
            .unwrap_or_else(|| ErrorStatistics::new(operation))
    }

    /// Totals across every operation; the most recent error wins.
    pub fn aggregate(&self) -> ErrorStatistics {
        let mut all = ErrorStatistics::new(AGGREGATE_NAME);
        let Ok(entries) = self.entries.lock() else {
            return all;
        };
        for stats in entries.values() {
            all.total += stats.total;
            all.succeeded += stats.succeeded;
            all.failed += stats.failed;
            if stats.last_error.is_some() && stats.last_error_at > all.last_error_at {
                all.last_error = stats.last_error.clone();
                all.last_error_at = stats.last_error_at;
            }
        }
        all
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
