// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Guard
//!
//! A single thread-scoped boolean, "materialization permitted", consulted by any
//! downstream code that should only run a side-effecting collection when the
//! enclosing step authorized it. Defaults to `false`; there is no global enable.
//!
//! The flag is set by the contract aspect for exactly the duration of the inner
//! call and reset through the same token mechanism as the context store.
//! [`guarded`] is the one place the flag is checked.

use thiserror::Error;

use super::ambient::{capability_slot, current_context, ActivationToken};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Materialization not allowed inside chain{}. Mark the step with a boundary (geo|io) or move collection outside the chain.",
    .step.as_ref().map(|s| format!(" (step '{}')", s)).unwrap_or_default()
)]
pub struct CapabilityDenied {
    pub step: Option<String>,
}

/// Handle for one capability activation.
#[must_use = "pass the token to `reset_materialization` to restore the previous flag"]
pub struct CapabilityToken(ActivationToken<bool>);

impl std::fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CapabilityToken")
    }
}

pub fn allow_materialization(allowed: bool) -> CapabilityToken {
    CapabilityToken(capability_slot().activate(Some(allowed)))
}

pub fn reset_materialization(token: CapabilityToken) {
    token.0.restore();
}

pub fn materialization_allowed() -> bool {
    capability_slot().read().unwrap_or(false)
}

/// Run `op` only if the active step permits materialization.
pub fn guarded<T>(op: impl FnOnce() -> T) -> Result<T, CapabilityDenied> {
    if !materialization_allowed() {
        return Err(CapabilityDenied {
            step: current_context().map(|ctx| ctx.step_name().to_string()),
        });
    }
    Ok(op())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::{ContainerShape, InvocationDescriptor};
    use crate::infrastructure::ambient::with_context;
    use std::sync::Arc;

    #[test]
    fn test_denied_by_default() {
        assert!(!materialization_allowed());
        let err = guarded(|| "collected").unwrap_err();
        assert_eq!(err.step, None);
        assert!(err.to_string().starts_with("Materialization not allowed inside chain."));
    }

    #[test]
    fn test_token_scopes_permission() {
        let token = allow_materialization(true);
        assert_eq!(guarded(|| 7).unwrap(), 7);

        let nested = allow_materialization(false);
        assert!(guarded(|| 7).is_err());
        reset_materialization(nested);
        assert!(materialization_allowed());

        reset_materialization(token);
        assert!(!materialization_allowed());
    }

    #[test]
    fn test_denial_names_active_step() {
        let ctx = Arc::new(InvocationDescriptor::new("load_rows", ContainerShape::Batch));
        let err = with_context(ctx, || guarded(|| ()).unwrap_err());
        assert_eq!(err.step.as_deref(), Some("load_rows"));
        assert!(err.to_string().contains("(step 'load_rows')"));
    }
}
