// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Decision Helpers
//!
//! Small decision functions an aspect consults to skip expensive sub-behavior for
//! a single invocation while still honoring the hook contract.
//!
//! - [`SamplingPolicy`]: deterministic counter sampling; errors always sampled.
//! - [`PropagationPolicy`]: whether the ambient store is touched at all.
//! - [`LoggingTier`]: which start/end events a tier emits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use super::config::ConfigError;
use super::invocation::{Boundary, InvocationDescriptor};

const MIN_SAMPLE_RATE: f64 = 0.0;
const MAX_SAMPLE_RATE: f64 = 1.0;

/// Samples every `⌈1/rate⌉`-th non-error invocation.
///
/// The counter is atomic so one policy instance may be shared by aspects running
/// on many threads at once.
#[derive(Debug)]
pub struct SamplingPolicy {
    rate: f64,
    interval: u64,
    counter: AtomicU64,
}

impl SamplingPolicy {
    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate <= MIN_SAMPLE_RATE || rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::InvalidSampleRate(rate));
        }
        Ok(Self {
            rate,
            interval: sample_interval(rate),
            counter: AtomicU64::new(0),
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Errors never advance the counter.
    pub fn should_sample(&self, is_error: bool) -> bool {
        if is_error {
            return true;
        }
        let seen = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        seen % self.interval == 0
    }
}

fn sample_interval(rate: f64) -> u64 {
    let reciprocal = MAX_SAMPLE_RATE / rate;
    let nearest = reciprocal.round();
    // 1/0.1 must give 10, not 11
    let interval = if (reciprocal - nearest).abs() < 1e-9 {
        nearest
    } else {
        reciprocal.ceil()
    };
    interval.max(1.0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropagationPolicy {
    pub propagate_all: bool,
}

impl PropagationPolicy {
    pub fn always() -> Self {
        Self { propagate_all: true }
    }

    pub fn boundaries_only() -> Self {
        Self { propagate_all: false }
    }

    /// Skipping is only ever a visibility change for nested readers, never a
    /// correctness change for the pipeline itself.
    pub fn should_propagate(&self, ctx: &InvocationDescriptor) -> bool {
        self.propagate_all || *ctx.boundary() != Boundary::None || ctx.trace_id().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingTier {
    Development,
    #[default]
    Production,
    Debug,
}

impl LoggingTier {
    pub fn should_log_before(&self, _ctx: &InvocationDescriptor) -> bool {
        matches!(self, Self::Development)
    }

    pub fn should_log_after(&self, ctx: &InvocationDescriptor, is_error: bool) -> bool {
        if is_error {
            return true;
        }
        match self {
            Self::Development => true,
            Self::Production => *ctx.boundary() != Boundary::None,
            Self::Debug => ctx.trace_id().is_some(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LoggingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggingTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "debug" => Ok(Self::Debug),
            other => Err(ConfigError::UnknownLoggingTier(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::{Boundary, ContainerShape};

    fn ctx(boundary: Boundary) -> InvocationDescriptor {
        InvocationDescriptor::new("s", ContainerShape::Single).with_boundary(boundary)
    }

    #[test]
    fn test_rate_tenth_samples_every_tenth_success() {
        let policy = SamplingPolicy::new(0.1).unwrap();
        assert_eq!(policy.interval(), 10);

        let positions: Vec<usize> = (1..=30).filter(|_| policy.should_sample(false)).collect();
        assert_eq!(positions, vec![10, 20, 30]);
    }

    #[test]
    fn test_errors_are_always_sampled_and_do_not_advance_counter() {
        let policy = SamplingPolicy::new(0.1).unwrap();
        for _ in 0..9 {
            assert!(!policy.should_sample(false));
        }
        for _ in 0..5 {
            assert!(policy.should_sample(true));
        }
        assert!(policy.should_sample(false));
    }

    #[test]
    fn test_interval_rounds_up_for_inexact_rates() {
        assert_eq!(SamplingPolicy::new(1.0).unwrap().interval(), 1);
        assert_eq!(SamplingPolicy::new(0.5).unwrap().interval(), 2);
        assert_eq!(SamplingPolicy::new(0.3).unwrap().interval(), 4);
        assert_eq!(SamplingPolicy::new(0.01).unwrap().interval(), 100);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        assert!(SamplingPolicy::new(0.0).is_err());
        assert!(SamplingPolicy::new(-0.5).is_err());
        assert!(SamplingPolicy::new(1.5).is_err());
        assert!(SamplingPolicy::new(f64::NAN).is_err());
    }

    #[test]
    fn test_propagation_policy() {
        let policy = PropagationPolicy::boundaries_only();
        assert!(!policy.should_propagate(&ctx(Boundary::None)));
        assert!(policy.should_propagate(&ctx(Boundary::Geo)));
        assert!(policy.should_propagate(&ctx(Boundary::None).with_trace_id("abc")));
        assert!(PropagationPolicy::always().should_propagate(&ctx(Boundary::None)));
    }

    #[test]
    fn test_logging_tier_decisions() {
        let internal = ctx(Boundary::None);
        let edge = ctx(Boundary::Io);
        let traced = ctx(Boundary::None).with_trace_id("t");

        assert!(LoggingTier::Development.should_log_before(&internal));
        assert!(!LoggingTier::Production.should_log_before(&edge));

        assert!(LoggingTier::Production.should_log_after(&internal, true));
        assert!(!LoggingTier::Production.should_log_after(&internal, false));
        assert!(LoggingTier::Production.should_log_after(&edge, false));

        assert!(LoggingTier::Debug.should_log_after(&traced, false));
        assert!(!LoggingTier::Debug.should_log_after(&internal, false));
        assert!(LoggingTier::Development.should_log_after(&internal, false));
    }

    #[test]
    fn test_logging_tier_parse() {
        assert_eq!("Development".parse::<LoggingTier>().unwrap(), LoggingTier::Development);
        assert_eq!("prod".parse::<LoggingTier>().unwrap(), LoggingTier::Production);
        assert!("verbose".parse::<LoggingTier>().is_err());
    }
}
