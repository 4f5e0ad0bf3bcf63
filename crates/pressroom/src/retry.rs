/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Retry policies for pipeline stages.
//!
//! Every stage carries a [`RetryPolicy`] that decides whether a failed
//! attempt is retried and how long to back off before the next attempt.
//! Delays grow according to a [`BackoffStrategy`] and are bounded by a
//! stage-specific ceiling, so a rate-limited backend is not hammered.

use std::time::Duration;

use crate::error::StageError;

/// How the delay between attempts grows.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Same delay for every attempt.
    Fixed,
    /// Delay grows linearly with the attempt number.
    Linear { multiplier: f64 },
    /// Delay grows geometrically: `initial * base^(attempt - 1)`.
    Exponential { base: f64, multiplier: f64 },
}

/// Which errors are worth retrying.
///
/// All configured conditions must be satisfied for a retry to happen.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryCondition {
    /// Never retry.
    Never,
    /// Retry any error.
    AllErrors,
    /// Retry only errors that are plausibly transient (network trouble,
    /// timeouts, regenerable validation failures).
    TransientOnly,
    /// Retry only errors whose message matches one of the given substrings.
    ErrorPattern { patterns: Vec<String> },
}

/// Retry policy for a single pipeline stage.
///
/// The default policy matches the observed production tuning: three attempts
/// with delays of 2s / 5s / 12s (exponential base 2.5, capped at 12s).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: i32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Ceiling on any computed delay.
    pub max_delay: Duration,
    /// Growth curve for the delay sequence.
    pub backoff_strategy: BackoffStrategy,
    /// Conditions that must all hold for a retry to be scheduled.
    pub retry_conditions: Vec<RetryCondition>,
    /// Whether to apply +/-20% jitter to computed delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(12),
            backoff_strategy: BackoffStrategy::Exponential {
                base: 2.5,
                multiplier: 1.0,
            },
            retry_conditions: vec![RetryCondition::TransientOnly],
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            retry_conditions: vec![RetryCondition::Never],
            ..Self::default()
        }
    }

    /// Computes the backoff delay after the given failed attempt (1-based).
    pub fn calculate_delay(&self, attempt: i32) -> Duration {
        let exponent = (attempt - 1).max(0);
        let base_secs = self.initial_delay.as_secs_f64();
        let raw_secs = match &self.backoff_strategy {
            BackoffStrategy::Fixed => base_secs,
            BackoffStrategy::Linear { multiplier } => base_secs * attempt.max(1) as f64 * multiplier,
            BackoffStrategy::Exponential { base, multiplier } => {
                base_secs * base.powi(exponent) * multiplier
            }
        };

        let capped = raw_secs.min(self.max_delay.as_secs_f64());
        let final_secs = if self.jitter {
            use rand::Rng;
            let factor: f64 = rand::thread_rng().gen_range(0.8..1.2);
            (capped * factor).min(self.max_delay.as_secs_f64())
        } else {
            capped
        };

        Duration::from_secs_f64(final_secs.max(0.0))
    }

    /// Decides whether the given error on the given attempt should be
    /// retried. All configured conditions must agree.
    pub fn should_retry(&self, attempt: i32, error: &StageError) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }

        self.retry_conditions.iter().all(|condition| match condition {
            RetryCondition::Never => false,
            RetryCondition::AllErrors => true,
            RetryCondition::TransientOnly => error.is_retryable(),
            RetryCondition::ErrorPattern { patterns } => {
                let message = error.to_string().to_lowercase();
                patterns
                    .iter()
                    .any(|pattern| message.contains(&pattern.to_lowercase()))
            }
        })
    }
}
