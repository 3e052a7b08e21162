use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 30,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Tracks consecutive remote search failures so a down search endpoint is skipped
/// instead of being waited on for every keystroke.
///
/// Uses tokio's clock so cooldowns follow paused time in tests.
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Returns whether a remote call may be attempted, moving Open to HalfOpen once the
    /// cooldown has elapsed.
    pub fn allow_request(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = self
                    .opened_at
                    .is_some_and(|opened| opened.elapsed() >= self.config.cooldown_duration());
                if cooled_down {
                    tracing::info!("Search breaker half-open, probing remote search");
                    self.state = CircuitState::HalfOpen;
                }
                cooled_down
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state != CircuitState::Closed {
            tracing::info!(previous_state = ?self.state, "Search breaker closed");
        }
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let should_open = match self.state {
            CircuitState::Closed => self.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if should_open {
            tracing::warn!(
                failures = self.consecutive_failures,
                cooldown_secs = self.config.cooldown_secs,
                "Search breaker opened, using local filtering"
            );
            self.state = CircuitState::Open;
            self.opened_at = Some(Instant::now());
        }
    }
}
