use std::future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Sleep;

pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

/// Delay between consecutive connect attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed {
        delay_ms: u64,
    },
    /// Doubles (or grows by `factor`) per attempt, capped at `max_ms`.
    Exponential {
        initial_ms: u64,
        max_ms: u64,
        #[serde(default = "default_factor")]
        factor: f64,
    },
}

fn default_factor() -> f64 {
    2.0
}

impl Backoff {
    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential {
                initial_ms,
                max_ms,
                factor,
            } => {
                let exponent = attempt.saturating_sub(1).min(63) as i32;
                let scaled = initial_ms as f64 * factor.max(1.0).powi(exponent);
                Duration::from_millis(scaled.min(max_ms as f64) as u64)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub backoff: Backoff,
    /// `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Fixed {
                delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            },
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Armed { delay: Duration, attempt: u32 },
    AlreadyPending,
    Exhausted { attempts: u32 },
}

/// Owns the single reconnect timer of a chat session.
///
/// A timer is only armed when none is pending, so repeated failures never
/// stack up concurrent reconnects.
pub struct Reconnector {
    policy: ReconnectPolicy,
    attempts: u32,
    pending: Option<Pin<Box<Sleep>>>,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            pending: None,
        }
    }

    pub fn schedule(&mut self) -> Schedule {
        if self.pending.is_some() {
            return Schedule::AlreadyPending;
        }
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return Schedule::Exhausted {
                    attempts: self.attempts,
                };
            }
        }

        self.attempts += 1;
        let delay = self.policy.backoff.delay_for(self.attempts);
        self.pending = Some(Box::pin(tokio::time::sleep(delay)));
        Schedule::Armed {
            delay,
            attempt: self.attempts,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the pending timer. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Called after a successful connect.
    pub fn reset(&mut self) {
        self.pending = None;
        self.attempts = 0;
    }

    /// Failed attempts since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Resolves when the pending timer elapses; pends forever when idle.
    ///
    /// Cancel-safe: if dropped before completion the timer stays armed.
    pub async fn fired(&mut self) {
        match self.pending.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.pending = None;
            }
            None => future::pending::<()>().await,
        }
    }
}
