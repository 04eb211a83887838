use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Outcome of asking a breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Allowed,
    /// Open timeout elapsed; this call is the half-open trial.
    Trial,
    Rejected { retry_in: Duration },
}

#[derive(Debug, Clone)]
pub(crate) struct Breaker {
    state: CircuitState,
    failures: u32,
    reopen_at: Option<Instant>,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            reopen_at: None,
        }
    }
}

impl Breaker {
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn admit(&mut self, now: Instant) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::HalfOpen => Admission::Trial,
            CircuitState::Open => match self.reopen_at {
                Some(at) if now < at => Admission::Rejected {
                    retry_in: at - now,
                },
                _ => {
                    self.state = CircuitState::HalfOpen;
                    Admission::Trial
                }
            },
        }
    }

    /// Returns true when this success closed a half-open circuit.
    pub fn on_success(&mut self) -> bool {
        let was_trial = self.state == CircuitState::HalfOpen;
        self.state = CircuitState::Closed;
        self.failures = 0;
        self.reopen_at = None;
        was_trial
    }

    /// Returns true when this failure opened the circuit.
    pub fn on_failure(&mut self, now: Instant, threshold: u32, timeout: Duration) -> bool {
        self.failures = self.failures.saturating_add(1);
        let trip = self.state == CircuitState::HalfOpen || self.failures >= threshold;
        if trip {
            self.state = CircuitState::Open;
            self.reopen_at = Some(now + timeout);
        }
        trip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let mut breaker = Breaker::default();
        let now = Instant::now();
        for _ in 0..4 {
            assert!(!breaker.on_failure(now, 5, TIMEOUT));
        }
        assert!(breaker.on_failure(now, 5, TIMEOUT));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(breaker.admit(now), Admission::Rejected { .. }));

        let later = now + TIMEOUT;
        assert_eq!(breaker.admit(later), Admission::Trial);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // a failed trial reopens immediately
        assert!(breaker.on_failure(later, 5, TIMEOUT));
        assert_eq!(breaker.admit(later), Admission::Rejected { retry_in: TIMEOUT });

        assert_eq!(breaker.admit(later + TIMEOUT), Admission::Trial);
        assert!(breaker.on_success());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failures(), 0);
    }

    #[tokio::test]
    async fn test_success_while_closed_resets_count() {
        let mut breaker = Breaker::default();
        let now = Instant::now();
        breaker.on_failure(now, 5, TIMEOUT);
        breaker.on_failure(now, 5, TIMEOUT);
        assert!(!breaker.on_success());
        assert_eq!(breaker.failures(), 0);
    }
}
