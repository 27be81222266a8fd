// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Contract Aspect
//!
//! Enforces the boundary policy of a step:
//!
//! - `before` rejects boundary labels outside `{none, geo, io}`
//! - `around` grants materialization through the capability guard for exactly
//!   the duration of the inner call, iff the boundary is in the allowed set
//!
//! The guard is reset by a scope guard, so the flag never outlives the call
//! even when it unwinds.

use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult};
use crate::domain::invocation::{Boundary, InvocationDescriptor};
use crate::infrastructure::guards::{allow_materialization, reset_materialization};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("Invalid boundary: '{0}'. Allowed: none, geo, io")]
    UnknownBoundary(String),
}

#[derive(Debug, Clone)]
pub struct ContractAspect {
    allowed: HashSet<Boundary>,
}

impl Default for ContractAspect {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractAspect {
    /// Materialization allowed for every crossing boundary (`geo`, `io`).
    pub fn new() -> Self {
        Self::with_allowed([Boundary::Geo, Boundary::Io])
    }

    pub fn with_allowed(allowed: impl IntoIterator<Item = Boundary>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn permits(&self, boundary: &Boundary) -> bool {
        self.allowed.contains(boundary)
    }
}

impl Aspect for ContractAspect {
    fn before(&self, ctx: &InvocationDescriptor) -> Result<(), StepError> {
        match ctx.boundary() {
            Boundary::Unrecognized(raw) => Err(ContractError::UnknownBoundary(raw.clone()).into()),
            _ => Ok(()),
        }
    }

    fn around(&self, ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        let allowed = self.permits(ctx.boundary());
        debug!(
            step = ctx.step_name(),
            boundary = ctx.boundary().as_str(),
            allowed,
            "materialization capability set"
        );
        let _reset = scopeguard::guard(allow_materialization(allowed), reset_materialization);
        next.run()
    }

    fn after(&self, _ctx: &InvocationDescriptor, _completion: Completion<'_>) -> Result<(), StepError> {
        Ok(())
    }
}
