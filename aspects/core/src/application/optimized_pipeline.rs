// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Optimized Pipeline Executor
//!
//! Same contract as [`super::pipeline::AspectPipeline`], lower constant cost:
//!
//! - no aspects: the unit of work is called directly, no phases at all
//! - one aspect: no chain is built, `around` receives the raw call
//! - two or more: the around-chain is walked over the aspect slice on demand
//!   instead of being folded into nested boxes up front
//!
//! Hook order, hook count, arguments, returned values and propagated errors are
//! identical to the baseline; the shared conformance suite runs against both.

use std::sync::Arc;
use std::time::Instant;

use crate::application::bundles::bundle_from_config;
use crate::application::pipeline::{
    catch_around, downcast_value, notify_after, run_before_phase, settle, PipelineExecutor,
};
use crate::domain::aspect::{Aspect, BoxedCall, Next, StepError, StepResult, StepValue};
use crate::domain::config::{AspectsConfig, ConfigError};
use crate::domain::invocation::InvocationDescriptor;

#[derive(Clone, Default)]
pub struct OptimizedPipeline {
    aspects: Arc<[Arc<dyn Aspect>]>,
}

impl OptimizedPipeline {
    pub fn new(aspects: impl IntoIterator<Item = Arc<dyn Aspect>>) -> Self {
        Self {
            aspects: aspects.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AspectsConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(bundle_from_config(config)?))
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    fn run_single<'a>(&'a self, aspect: &'a Arc<dyn Aspect>, ctx: &'a InvocationDescriptor, unit: BoxedCall<'a>) -> StepResult {
        run_before_phase(std::slice::from_ref(aspect), ctx)?;

        let started = Instant::now();
        let around = catch_around(|| aspect.around(ctx, Next::from_boxed(unit)));
        settle(started, around, |completion| notify_after(aspect.as_ref(), ctx, completion))
    }

    fn run_many<'a>(&'a self, ctx: &'a InvocationDescriptor, unit: BoxedCall<'a>) -> StepResult {
        let aspects: &'a [Arc<dyn Aspect>] = &self.aspects;

        run_before_phase(aspects, ctx)?;

        let started = Instant::now();
        let around = catch_around(|| Next::chain(ctx, aspects, unit).run());
        settle(started, around, |completion| {
            for aspect in aspects {
                notify_after(aspect.as_ref(), ctx, completion);
            }
        })
    }
}

impl std::fmt::Debug for OptimizedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.aspects.iter().map(|aspect| aspect.name()))
            .finish()
    }
}

impl PipelineExecutor for OptimizedPipeline {
    fn aspects(&self) -> &[Arc<dyn Aspect>] {
        &self.aspects
    }

    fn execute_erased<'a>(&'a self, ctx: &'a InvocationDescriptor, unit: BoxedCall<'a>) -> StepResult {
        match &*self.aspects {
            [] => unit(),
            [single] => self.run_single(single, ctx, unit),
            _ => self.run_many(ctx, unit),
        }
    }

    fn execute<'a, T, F>(&'a self, ctx: &'a InvocationDescriptor, unit: F) -> Result<T, StepError>
    where
        Self: Sized,
        T: 'static,
        F: FnOnce() -> Result<T, StepError> + 'a,
    {
        if self.aspects.is_empty() {
            return unit();
        }
        let value = self.execute_erased(ctx, Box::new(move || unit().map(|value| Box::new(value) as StepValue)))?;
        downcast_value(value)
    }
}
