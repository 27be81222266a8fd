// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Sampled Metrics Aspect
//!
//! [`super::MetricsAspect`] behind a [`SamplingPolicy`]: every failure is
//! recorded, successes only at the sampled positions.

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult};
use crate::domain::config::ConfigError;
use crate::domain::invocation::InvocationDescriptor;
use crate::domain::sampling::SamplingPolicy;

use super::metrics::{MetricsAspect, MetricsSnapshot};

#[derive(Debug)]
pub struct SampledMetricsAspect {
    policy: SamplingPolicy,
    inner: MetricsAspect,
}

impl SampledMetricsAspect {
    pub fn new(sample_rate: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: SamplingPolicy::new(sample_rate)?,
            inner: MetricsAspect::new(),
        })
    }

    pub fn policy(&self) -> &SamplingPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.snapshot()
    }
}

impl Aspect for SampledMetricsAspect {
    fn before(&self, _ctx: &InvocationDescriptor) -> Result<(), StepError> {
        Ok(())
    }

    fn around(&self, _ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        next.run()
    }

    fn after(&self, ctx: &InvocationDescriptor, completion: Completion<'_>) -> Result<(), StepError> {
        if self.policy.should_sample(completion.is_error()) {
            self.inner.observe(ctx, completion);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::ContainerShape;
    use std::time::Duration;

    #[test]
    fn test_records_every_tenth_success_and_all_errors() {
        let aspect = SampledMetricsAspect::new(0.1).unwrap();
        let ctx = InvocationDescriptor::new("hot_loop", ContainerShape::Single);
        let done: StepResult = Ok(Box::new(()));
        let failed: StepResult = Err(StepError::msg("TimeoutError", "slow"));

        for _ in 0..30 {
            aspect.after(&ctx, Completion::of(&done, Duration::ZERO)).unwrap();
        }
        for _ in 0..3 {
            aspect.after(&ctx, Completion::of(&failed, Duration::ZERO)).unwrap();
        }

        let snapshot = aspect.snapshot();
        assert_eq!(snapshot.calls("hot_loop"), 6);
        assert_eq!(snapshot.errors("hot_loop"), 3);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        assert!(matches!(
            SampledMetricsAspect::new(2.0),
            Err(ConfigError::InvalidSampleRate(_))
        ));
    }
}
