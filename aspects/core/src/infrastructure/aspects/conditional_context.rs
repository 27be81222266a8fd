// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Conditional Context Propagation Aspect
//!
//! [`super::ContextPropagationAspect`] gated by a [`PropagationPolicy`]. The
//! policy is a pure function of the descriptor, so `before` and `after` always
//! agree on whether the store was touched.

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult};
use crate::domain::invocation::InvocationDescriptor;
use crate::domain::sampling::PropagationPolicy;
use crate::infrastructure::ambient::{pop_step_context, push_step_context};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalContextPropagationAspect {
    policy: PropagationPolicy,
}

impl ConditionalContextPropagationAspect {
    pub fn new(policy: PropagationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PropagationPolicy {
        self.policy
    }
}

impl Aspect for ConditionalContextPropagationAspect {
    fn before(&self, ctx: &InvocationDescriptor) -> Result<(), StepError> {
        if self.policy.should_propagate(ctx) {
            push_step_context(ctx);
        }
        Ok(())
    }

    fn around(&self, _ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        next.run()
    }

    fn after(&self, ctx: &InvocationDescriptor, _completion: Completion<'_>) -> Result<(), StepError> {
        if self.policy.should_propagate(ctx) {
            pop_step_context(ctx)?;
        }
        Ok(())
    }
}
