// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the concrete aspects shipped in the bundles.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements mod

pub mod context;
pub mod conditional_context;
pub mod contract;
pub mod logging;
pub mod smart_logging;
pub mod tracing;
pub mod metrics;
pub mod sampled_metrics;

pub use self::conditional_context::ConditionalContextPropagationAspect;
pub use self::context::ContextPropagationAspect;
pub use self::contract::{ContractAspect, ContractError};
pub use self::logging::{LoggingAspect, StepEvent};
pub use self::metrics::{MetricsAspect, MetricsSnapshot};
pub use self::sampled_metrics::SampledMetricsAspect;
pub use self::smart_logging::SmartLoggingAspect;
pub use self::tracing::TracingAspect;
