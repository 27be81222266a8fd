// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Context Propagation Aspect
//!
//! Makes the invocation descriptor ambient for the whole step: activated in
//! `before`, restored in `after`. Code nested anywhere under the unit of work
//! reads it through [`crate::infrastructure::ambient::current_context`].

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult};
use crate::domain::invocation::InvocationDescriptor;
use crate::infrastructure::ambient::{pop_step_context, push_step_context};

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextPropagationAspect;

impl ContextPropagationAspect {
    pub fn new() -> Self {
        Self
    }
}

impl Aspect for ContextPropagationAspect {
    fn before(&self, ctx: &InvocationDescriptor) -> Result<(), StepError> {
        push_step_context(ctx);
        Ok(())
    }

    fn around(&self, _ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        next.run()
    }

    fn after(&self, ctx: &InvocationDescriptor, _completion: Completion<'_>) -> Result<(), StepError> {
        pop_step_context(ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aspect::StepValue;
    use crate::domain::invocation::ContainerShape;
    use crate::infrastructure::ambient::current_context;
    use std::time::Duration;

    #[test]
    fn test_descriptor_visible_between_before_and_after() {
        let aspect = ContextPropagationAspect::new();
        let ctx = InvocationDescriptor::new("enrich", ContainerShape::Workflow).with_run_id("r-9");

        aspect.before(&ctx).unwrap();
        let seen = aspect
            .around(&ctx, Next::new(|| {
                let run_id = current_context().and_then(|d| d.run_id().map(str::to_string));
                Ok(Box::new(run_id) as StepValue)
            }))
            .unwrap();
        assert_eq!(seen.downcast_ref::<Option<String>>().unwrap().as_deref(), Some("r-9"));

        let done: StepResult = Ok(Box::new(()));
        aspect.after(&ctx, Completion::of(&done, Duration::ZERO)).unwrap();
        assert!(current_context().is_none());
    }

    #[test]
    fn test_unmatched_after_is_reported() {
        let aspect = ContextPropagationAspect::new();
        let ctx = InvocationDescriptor::new("orphan", ContainerShape::Single);
        let done: StepResult = Ok(Box::new(()));
        let err = aspect.after(&ctx, Completion::of(&done, Duration::ZERO)).unwrap_err();
        assert_eq!(err.kind(), "AmbientError");
    }
}
