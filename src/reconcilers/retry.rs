// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for conflicted Kubernetes writes.
//!
//! Metadata writes (finalizers, annotations) race the garbage collector and
//! other controllers under optimistic concurrency. Conflicted writes are
//! retried after re-reading, with jittered exponential backoff; permanent
//! errors fail fast.

use rand::Rng;
use std::time::Duration;

/// Maximum number of attempts for a conflicted write.
pub const MAX_CONFLICT_RETRIES: u32 = 5;

/// Initial retry interval (100ms).
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (5 seconds).
const MAX_INTERVAL_MILLIS: u64 = 5000;

/// Backoff multiplier (exponential growth factor).
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%).
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Jittered exponential backoff over a fixed attempt budget.
pub struct ConflictBackoff {
    current_interval: Duration,
    attempts: u32,
}

impl ConflictBackoff {
    /// Create a fresh backoff sequence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_interval: Duration::from_millis(INITIAL_INTERVAL_MILLIS),
            attempts: 0,
        }
    }

    /// Next backoff interval, or `None` once the attempt budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= MAX_CONFLICT_RETRIES {
            return None;
        }
        self.attempts += 1;

        let jittered = apply_jitter(self.current_interval);
        let next = self.current_interval.as_secs_f64() * BACKOFF_MULTIPLIER;
        self.current_interval =
            Duration::from_secs_f64(next).min(Duration::from_millis(MAX_INTERVAL_MILLIS));

        Some(jittered)
    }
}

impl Default for ConflictBackoff {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_jitter(interval: Duration) -> Duration {
    let secs = interval.as_secs_f64();
    let delta = secs * RANDOMIZATION_FACTOR;
    let jittered = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));
    Duration::from_secs_f64(jittered.max(0.0))
}

/// True when a kube error is an optimistic-concurrency conflict (HTTP 409).
#[must_use]
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == 409)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
