/// Tunables shared by the service, recovery and resilience layers.
///
/// Every field has a default so a partial (or empty) JSON object is a valid
/// configuration.
use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_BOARD_TITLES;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: u32,
    /// How close a backup's lastModified must be to a requested restore time.
    #[serde(default = "default_restore_window_secs")]
    pub restore_window_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_board_titles")]
    pub default_board_titles: Vec<String>,
    /// Per-context board titles used when a context is first initialized.
    #[serde(default)]
    pub board_templates: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

fn default_backup_retention_days() -> u32 {
    30
}

fn default_restore_window_secs() -> u64 {
    60
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_throttle_ms() -> u64 {
    1000
}

fn default_board_titles() -> Vec<String> {
    DEFAULT_BOARD_TITLES.iter().map(|t| t.to_string()).collect()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_open_timeout_ms() -> u64 {
    30_000
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            backup_retention_days: default_backup_retention_days(),
            restore_window_secs: default_restore_window_secs(),
            debounce_ms: default_debounce_ms(),
            throttle_ms: default_throttle_ms(),
            default_board_titles: default_board_titles(),
            board_templates: HashMap::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

impl CoreConfig {
    /// Board titles for a new context: its template if one is configured,
    /// otherwise the default titles.
    pub fn titles_for(&self, context: &str) -> &[String] {
        match self.board_templates.get(context) {
            Some(titles) if !titles.is_empty() => titles.as_slice(),
            _ => self.default_board_titles.as_slice(),
        }
    }

    pub fn restore_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.restore_window_secs as i64)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}
