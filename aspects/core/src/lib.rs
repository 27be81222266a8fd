// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Aspect pipeline and ambient-context propagation engine.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Wraps a unit of work with an ordered set of cross-cutting
//!   aspects and exposes the active invocation to nested code.
//!
//! ```text
//! caller
//!   └─ PipelineExecutor::execute(&descriptor, unit)
//!         ├─ before phase   (declared order, fail-fast)
//!         ├─ around phase   (first aspect outermost, unit innermost)
//!         └─ after phase    (declared order, always, outcome + elapsed)
//! ```

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::bundles::{bundle_from_config, default_bundle, dev_bundle, prod_bundle, BundleKind};
pub use application::optimized_pipeline::OptimizedPipeline;
pub use application::pipeline::{execute_pipeline, AspectPipeline, PipelineError, PipelineExecutor};
pub use infrastructure::ambient::{
    activate_context, current_context, deactivate_context, pop_step_context, push_step_context,
    with_context, AmbientError, AmbientSnapshot, ContextToken, Instrumented,
};
pub use infrastructure::aspects::{
    ConditionalContextPropagationAspect, ContextPropagationAspect, ContractAspect, ContractError,
    LoggingAspect, MetricsAspect, MetricsSnapshot, SampledMetricsAspect, SmartLoggingAspect,
    StepEvent, TracingAspect,
};
pub use infrastructure::logging_ext::{ApiCallEvent, CacheOperationEvent, DbQueryEvent};
pub use infrastructure::guards::{
    allow_materialization, guarded, materialization_allowed, reset_materialization,
    CapabilityDenied, CapabilityToken,
};
