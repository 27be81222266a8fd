// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the value types and contracts shared by every pipeline participant.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod invocation;
pub mod aspect;
pub mod sampling;
pub mod config;

pub use aspect::{Aspect, BoxedCall, Completion, Next, StepCancelled, StepError, StepResult, StepStatus, StepValue};
pub use config::{AspectsConfig, ConfigError};
pub use invocation::{Boundary, ContainerShape, InvocationDescriptor, InvalidShape};
pub use sampling::{LoggingTier, PropagationPolicy, SamplingPolicy};
