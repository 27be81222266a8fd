// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tracing Aspect
//!
//! Opens a `step` span around the inner call. Span fields follow the
//! OpenTelemetry conventions understood by `tracing-opentelemetry` bridges
//! (`otel.name`, `otel.status_code`), so an exporter installed by the host
//! process picks them up without this crate depending on one.

use tracing::field::Empty;
use tracing::info_span;

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult};
use crate::domain::invocation::InvocationDescriptor;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAspect;

impl TracingAspect {
    pub fn new() -> Self {
        Self
    }
}

impl Aspect for TracingAspect {
    fn before(&self, _ctx: &InvocationDescriptor) -> Result<(), StepError> {
        Ok(())
    }

    fn around(&self, ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        let span = info_span!(
            "step",
            otel.name = ctx.step_name(),
            step = ctx.step_name(),
            shape = ctx.container_shape().as_str(),
            boundary = ctx.boundary().as_str(),
            run_id = ctx.run_id().unwrap_or_default(),
            tenant = ctx.tenant().unwrap_or_default(),
            otel.status_code = Empty,
            error.kind = Empty,
        );
        let _enter = span.enter();

        let result = next.run();
        if let Err(err) = &result {
            span.record("otel.status_code", "ERROR");
            span.record("error.kind", err.kind());
        }
        result
    }

    fn after(&self, _ctx: &InvocationDescriptor, _completion: Completion<'_>) -> Result<(), StepError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aspect::StepValue;
    use crate::domain::invocation::ContainerShape;

    #[test]
    fn test_outcome_passes_through_span() {
        let aspect = TracingAspect::new();
        let ctx = InvocationDescriptor::new("traced", ContainerShape::Single).with_run_id("r");

        let value = aspect.around(&ctx, Next::new(|| Ok(Box::new(5_i32) as StepValue))).unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&5));

        let err = aspect
            .around(&ctx, Next::new(|| Err(StepError::msg("ValueError", "bad input"))))
            .unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }
}
