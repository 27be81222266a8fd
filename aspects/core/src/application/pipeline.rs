// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pipeline Executor
//!
//! Composes an ordered sequence of aspects around one unit of work.
//!
//! ## Phases
//!
//! ```text
//! 1. before   a1.before → a2.before → … → an.before      (first Err aborts; no after runs)
//! 2. around   a1.around( a2.around( … an.around( unit ) ) )
//! 3. after    a1.after → a2.after → … → an.after         (always, value or error)
//! ```
//!
//! Phase 3 runs for every aspect even when the call failed or unwound; the
//! original outcome is returned (or the unwind resumed) only afterwards. An
//! `after` hook that itself fails is logged and counted, and never replaces the
//! primary outcome.
//!
//! Two implementations share this contract: [`AspectPipeline`] (this module)
//! folds the around-chain up front, while
//! [`super::optimized_pipeline::OptimizedPipeline`] adds fast paths. They are
//! observably identical.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error};

use crate::application::bundles::bundle_from_config;
use crate::domain::aspect::{Aspect, BoxedCall, Completion, Next, StepError, StepResult, StepValue};
use crate::domain::config::{AspectsConfig, ConfigError};
use crate::domain::invocation::InvocationDescriptor;
use crate::infrastructure::ambient::Checkpoint;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("an aspect substituted a value that is not a `{expected}`")]
    ResultTypeMismatch { expected: &'static str },
}

pub trait PipelineExecutor: Send + Sync {
    fn aspects(&self) -> &[Arc<dyn Aspect>];

    /// Run `unit` under the aspect sequence with type-erased values.
    fn execute_erased<'a>(&'a self, ctx: &'a InvocationDescriptor, unit: BoxedCall<'a>) -> StepResult;

    /// Run `unit` under the aspect sequence. Returns exactly what `unit` returned,
    /// or the error of a `before` hook that rejected the invocation.
    fn execute<'a, T, F>(&'a self, ctx: &'a InvocationDescriptor, unit: F) -> Result<T, StepError>
    where
        Self: Sized,
        T: 'static,
        F: FnOnce() -> Result<T, StepError> + 'a,
    {
        let value = self.execute_erased(ctx, Box::new(move || unit().map(|value| Box::new(value) as StepValue)))?;
        downcast_value(value)
    }
}

/// One-shot execution without keeping a pipeline around.
pub fn execute_pipeline<T, F>(ctx: &InvocationDescriptor, aspects: &[Arc<dyn Aspect>], unit: F) -> Result<T, StepError>
where
    T: 'static,
    F: FnOnce() -> Result<T, StepError>,
{
    AspectPipeline::new(aspects.iter().cloned()).execute(ctx, unit)
}

pub(crate) fn downcast_value<T: 'static>(value: StepValue) -> Result<T, StepError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            PipelineError::ResultTypeMismatch {
                expected: std::any::type_name::<T>(),
            }
            .into()
        })
}

/// Runs one `before` hook.
pub(crate) fn run_before(aspect: &dyn Aspect, ctx: &InvocationDescriptor) -> Result<(), StepError> {
    aspect.before(ctx).inspect_err(|err| {
        debug!(
            aspect = aspect.name(),
            step = ctx.step_name(),
            error.kind = err.kind(),
            "before hook rejected invocation: {}",
            err
        );
    })
}

/// Runs every `before` hook in order, failing fast. On an error or an unwind
/// the ambient state is rolled back to what it was on entry.
pub(crate) fn run_before_phase(aspects: &[Arc<dyn Aspect>], ctx: &InvocationDescriptor) -> Result<(), StepError> {
    let checkpoint = scopeguard::guard_on_unwind(Checkpoint::capture(), Checkpoint::restore);
    for aspect in aspects {
        if let Err(err) = run_before(aspect.as_ref(), ctx) {
            scopeguard::ScopeGuard::into_inner(checkpoint).restore();
            return Err(err);
        }
    }
    drop(scopeguard::ScopeGuard::into_inner(checkpoint));
    Ok(())
}

/// Runs one `after` hook. A failing hook is a defect: it is reported on its own
/// and the primary outcome is left untouched.
pub(crate) fn notify_after(aspect: &dyn Aspect, ctx: &InvocationDescriptor, completion: Completion<'_>) {
    if let Err(defect) = aspect.after(ctx, completion) {
        metrics::counter!(
            "wanaspects_after_hook_failures_total",
            "aspect" => aspect.name().to_string()
        )
        .increment(1);
        error!(
            aspect = aspect.name(),
            step = ctx.step_name(),
            error.kind = defect.kind(),
            "after hook failed, original outcome preserved: {}",
            defect
        );
    }
}

/// Hands the around-phase outcome to `after_phase`, then returns it. An unwind
/// is reported as a `Cancelled` error and resumed once the after-phase is done.
pub(crate) fn settle<A>(started: Instant, around: std::thread::Result<StepResult>, after_phase: A) -> StepResult
where
    A: for<'c> FnOnce(Completion<'c>),
{
    let elapsed = started.elapsed();
    match around {
        Ok(result) => {
            after_phase(Completion::of(&result, elapsed));
            result
        }
        Err(payload) => {
            let cancelled: StepResult = Err(StepError::cancelled(payload.as_ref()));
            after_phase(Completion::of(&cancelled, elapsed));
            panic::resume_unwind(payload)
        }
    }
}

/// Runs the around phase, capturing an unwind instead of letting it skip the
/// after phase.
pub(crate) fn catch_around<F>(call: F) -> Result<StepResult, Box<dyn Any + Send>>
where
    F: FnOnce() -> StepResult,
{
    panic::catch_unwind(AssertUnwindSafe(call))
}

/// Baseline executor.
#[derive(Clone, Default)]
pub struct AspectPipeline {
    aspects: Vec<Arc<dyn Aspect>>,
}

impl AspectPipeline {
    pub fn new(aspects: impl IntoIterator<Item = Arc<dyn Aspect>>) -> Self {
        Self {
            aspects: aspects.into_iter().collect(),
        }
    }

    /// Build from the bundle the configuration selects.
    pub fn from_config(config: &AspectsConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(bundle_from_config(config)?))
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }
}

impl std::fmt::Debug for AspectPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.aspects.iter().map(|aspect| aspect.name()))
            .finish()
    }
}

impl PipelineExecutor for AspectPipeline {
    fn aspects(&self) -> &[Arc<dyn Aspect>] {
        &self.aspects
    }

    fn execute_erased<'a>(&'a self, ctx: &'a InvocationDescriptor, unit: BoxedCall<'a>) -> StepResult {
        run_before_phase(&self.aspects, ctx)?;

        // fold from last to first: the first aspect ends up outermost
        let call = self
            .aspects
            .iter()
            .rev()
            .fold(unit, |inner: BoxedCall<'a>, aspect| -> BoxedCall<'a> {
                Box::new(move || aspect.around(ctx, Next::from_boxed(inner)))
            });

        let started = Instant::now();
        let around = catch_around(call);
        settle(started, around, |completion| {
            for aspect in &self.aspects {
                notify_after(aspect.as_ref(), ctx, completion);
            }
        })
    }
}
