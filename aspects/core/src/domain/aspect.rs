// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Aspect Contract
//!
//! An [`Aspect`] is one cross-cutting behavior expressed as three hooks over an
//! [`InvocationDescriptor`]:
//!
//! | Hook | When | May fail? |
//! |------|------|-----------|
//! | `before` | prior to the wrapped call, declared order | yes, aborts the pipeline before any work |
//! | `around` | wraps the rest of the chain via [`Next`] | returns the call's outcome |
//! | `after` | once the call concluded, declared order | a failure is a defect, never the outcome |
//!
//! Values flow through the chain type-erased ([`StepValue`]) so that aspects stay
//! object-safe; the typed entry point lives on the executor.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::invocation::InvocationDescriptor;

pub type StepValue = Box<dyn Any>;
pub type StepResult = Result<StepValue, StepError>;
pub type BoxedCall<'a> = Box<dyn FnOnce() -> StepResult + 'a>;

/// Error raised by a unit of work or a hook.
///
/// Wraps the original error untouched so callers can still `downcast_ref` to the
/// concrete type, and records `kind`, the short type name of the wrapped error,
/// for reporting.
pub struct StepError {
    kind: String,
    inner: anyhow::Error,
}

impl StepError {
    /// Error carrying only a message, reported under the given kind.
    pub fn msg(kind: impl Into<String>, message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self {
            kind: kind.into(),
            inner: anyhow::Error::msg(message),
        }
    }

    pub fn from_anyhow(inner: anyhow::Error) -> Self {
        Self {
            kind: "Error".to_string(),
            inner,
        }
    }

    /// Error handed to `after` hooks when the around phase unwinds.
    pub fn cancelled(payload: &(dyn Any + Send)) -> Self {
        let reason = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self {
            kind: "Cancelled".to_string(),
            inner: anyhow::Error::new(StepCancelled { reason }),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is<E>(&self) -> bool
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.is::<E>()
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    pub fn is_cancelled(&self) -> bool {
        self.is::<StepCancelled>()
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl<E> From<E> for StepError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self {
            kind: short_type_name::<E>().to_string(),
            inner: anyhow::Error::new(err),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl fmt::Debug for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepError")
            .field("kind", &self.kind)
            .field("inner", &self.inner)
            .finish()
    }
}

fn short_type_name<E: ?Sized>() -> &'static str {
    let full = std::any::type_name::<E>();
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

/// Terminal outcome recorded when the wrapped call unwinds instead of returning.
#[derive(Debug, Clone, Error)]
#[error("step cancelled: {reason}")]
pub struct StepCancelled {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    Ok,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `after` hooks observe: exactly one of value or error, plus the elapsed
/// wall time of the around phase as measured by the executor.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    outcome: Result<&'a dyn Any, &'a StepError>,
    elapsed: Duration,
}

impl<'a> Completion<'a> {
    pub fn new(outcome: Result<&'a dyn Any, &'a StepError>, elapsed: Duration) -> Self {
        Self { outcome, elapsed }
    }

    pub(crate) fn of(result: &'a StepResult, elapsed: Duration) -> Self {
        let outcome = match result {
            Ok(value) => Ok(&**value as &dyn Any),
            Err(err) => Err(err),
        };
        Self::new(outcome, elapsed)
    }

    pub fn outcome(&self) -> Result<&'a dyn Any, &'a StepError> {
        self.outcome
    }

    pub fn value(&self) -> Option<&'a dyn Any> {
        self.outcome.ok()
    }

    pub fn value_as<T: 'static>(&self) -> Option<&'a T> {
        self.outcome.ok().and_then(|value| value.downcast_ref::<T>())
    }

    pub fn error(&self) -> Option<&'a StepError> {
        self.outcome.err()
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn status(&self) -> StepStatus {
        if self.is_error() {
            StepStatus::Error
        } else {
            StepStatus::Ok
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// The remainder of the around-chain. Consumed by [`Next::run`], so an aspect
/// can invoke it at most once; dropping it without running short-circuits.
pub struct Next<'a> {
    repr: NextRepr<'a>,
}

enum NextRepr<'a> {
    Call(BoxedCall<'a>),
    Chain {
        ctx: &'a InvocationDescriptor,
        rest: &'a [Arc<dyn Aspect>],
        call: BoxedCall<'a>,
    },
}

impl<'a> Next<'a> {
    pub fn new(call: impl FnOnce() -> StepResult + 'a) -> Self {
        Self::from_boxed(Box::new(call))
    }

    pub(crate) fn from_boxed(call: BoxedCall<'a>) -> Self {
        Self {
            repr: NextRepr::Call(call),
        }
    }

    /// Linked composition over a slice: each `run` hands the head aspect a `Next`
    /// over the tail, without building the chain up front.
    pub(crate) fn chain(ctx: &'a InvocationDescriptor, rest: &'a [Arc<dyn Aspect>], call: BoxedCall<'a>) -> Self {
        Self {
            repr: NextRepr::Chain { ctx, rest, call },
        }
    }

    pub fn run(self) -> StepResult {
        match self.repr {
            NextRepr::Call(call) => call(),
            NextRepr::Chain { ctx, rest, call } => match rest.split_first() {
                None => call(),
                Some((head, tail)) => head.around(ctx, Next::chain(ctx, tail, call)),
            },
        }
    }
}

/// Cross-cutting behavior. All three hooks must be implemented; a no-op is valid.
pub trait Aspect: Send + Sync {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn before(&self, ctx: &InvocationDescriptor) -> Result<(), StepError>;

    fn around(&self, ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult;

    fn after(&self, ctx: &InvocationDescriptor, completion: Completion<'_>) -> Result<(), StepError>;
}
