// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Metrics Aspect
//!
//! Records one observation per completed step through the `metrics` facade:
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `wanchain_steps_total` | counter | step, shape, boundary, status |
//! | `wanchain_step_duration_seconds` | histogram | step, shape, boundary, status |
//! | `wanchain_step_errors_total` | counter | step, shape, boundary, error_kind |
//!
//! Without an installed recorder the facade calls are no-ops. The aspect also
//! keeps a per-step tally in process, readable via [`MetricsAspect::snapshot`].

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult};
use crate::domain::invocation::InvocationDescriptor;

pub const STEPS_TOTAL: &str = "wanchain_steps_total";
pub const STEP_DURATION_SECONDS: &str = "wanchain_step_duration_seconds";
pub const STEP_ERRORS_TOTAL: &str = "wanchain_step_errors_total";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepTally {
    pub calls: u64,
    pub errors: u64,
    pub total_duration: Duration,
    pub error_kinds: BTreeMap<String, u64>,
}

/// Point-in-time copy of the in-process tally, keyed by step name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub steps: BTreeMap<String, StepTally>,
}

impl MetricsSnapshot {
    pub fn calls(&self, step: &str) -> u64 {
        self.steps.get(step).map(|tally| tally.calls).unwrap_or(0)
    }

    pub fn errors(&self, step: &str) -> u64 {
        self.steps.get(step).map(|tally| tally.errors).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct MetricsAspect {
    tally: Mutex<BTreeMap<String, StepTally>>,
}

impl MetricsAspect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            steps: self.tally.lock().clone(),
        }
    }

    /// Emit and tally one completed invocation.
    pub fn observe(&self, ctx: &InvocationDescriptor, completion: Completion<'_>) {
        let step = ctx.step_name().to_string();
        let shape = ctx.container_shape().as_str();
        let boundary = ctx.boundary().as_str().to_string();
        let status = completion.status().as_str();

        metrics::counter!(
            STEPS_TOTAL,
            "step" => step.clone(),
            "shape" => shape,
            "boundary" => boundary.clone(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!(
            STEP_DURATION_SECONDS,
            "step" => step.clone(),
            "shape" => shape,
            "boundary" => boundary.clone(),
            "status" => status
        )
        .record(completion.elapsed().as_secs_f64());

        let error_kind = completion.error().map(|err| err.kind().to_string());
        if let Some(kind) = &error_kind {
            metrics::counter!(
                STEP_ERRORS_TOTAL,
                "step" => step.clone(),
                "shape" => shape,
                "boundary" => boundary,
                "error_kind" => kind.clone()
            )
            .increment(1);
        }

        let mut tally = self.tally.lock();
        let entry = tally.entry(step).or_default();
        entry.calls += 1;
        entry.total_duration += completion.elapsed();
        if let Some(kind) = error_kind {
            entry.errors += 1;
            *entry.error_kinds.entry(kind).or_insert(0) += 1;
        }
    }
}

impl Aspect for MetricsAspect {
    fn before(&self, _ctx: &InvocationDescriptor) -> Result<(), StepError> {
        Ok(())
    }

    fn around(&self, _ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        next.run()
    }

    fn after(&self, ctx: &InvocationDescriptor, completion: Completion<'_>) -> Result<(), StepError> {
        self.observe(ctx, completion);
        Ok(())
    }
}
