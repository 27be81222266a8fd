// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Smart Logging Aspect
//!
//! [`super::LoggingAspect`] events filtered by a [`LoggingTier`]. Failures are
//! always logged; successful steps only where the tier asks for them.

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult};
use crate::domain::invocation::InvocationDescriptor;
use crate::domain::sampling::LoggingTier;

use super::logging::StepEvent;

#[derive(Debug, Clone, Copy, Default)]
pub struct SmartLoggingAspect {
    tier: LoggingTier,
}

impl SmartLoggingAspect {
    pub fn new(tier: LoggingTier) -> Self {
        Self { tier }
    }

    pub fn tier(&self) -> LoggingTier {
        self.tier
    }

    /// The event `after` would emit for this completion, if any.
    pub fn end_event(&self, ctx: &InvocationDescriptor, completion: Completion<'_>) -> Option<StepEvent> {
        self.tier
            .should_log_after(ctx, completion.is_error())
            .then(|| StepEvent::end(ctx, completion))
    }
}

impl Aspect for SmartLoggingAspect {
    fn before(&self, ctx: &InvocationDescriptor) -> Result<(), StepError> {
        if self.tier.should_log_before(ctx) {
            StepEvent::start(ctx).emit();
        }
        Ok(())
    }

    fn around(&self, _ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        next.run()
    }

    fn after(&self, ctx: &InvocationDescriptor, completion: Completion<'_>) -> Result<(), StepError> {
        if let Some(event) = self.end_event(ctx, completion) {
            event.emit();
        }
        Ok(())
    }
}
