// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ambient Context Store
//!
//! Thread-scoped slots that expose the active [`InvocationDescriptor`] (and the
//! materialization flag used by [`super::guards`]) to arbitrarily deep code
//! without threading it through parameters.
//!
//! ## Token-based restore
//!
//! `activate_*` swaps the new value in and returns a token holding the value it
//! replaced. Deactivating a token restores exactly that value, whatever is
//! active at the time. Nested activations therefore unwind correctly even when
//! an inner scope forgot to deactivate; there is no shared depth counter to
//! corrupt. Tokens are consumed on use and are `!Send`.
//!
//! ## Crossing execution contexts
//!
//! Nothing is inherited by spawned threads or tasks. Forwarding is explicit:
//!
//! ```text
//! let snapshot = AmbientSnapshot::capture();      // parent
//! std::thread::spawn(move || snapshot.scope(f));  // child thread
//! tokio::spawn(snapshot.instrument(fut));         // child task, re-entered on every poll
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::thread::LocalKey;
use thiserror::Error;

use crate::domain::invocation::InvocationDescriptor;

thread_local! {
    static CURRENT_DESCRIPTOR: RefCell<Option<Arc<InvocationDescriptor>>> = const { RefCell::new(None) };
    static MATERIALIZE_ALLOWED: RefCell<Option<bool>> = const { RefCell::new(None) };
    static STEP_TOKENS: RefCell<Vec<StepEntry>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Error)]
pub enum AmbientError {
    #[error("no step context is active on this thread")]
    NoActiveStep,
}

/// One thread-scoped slot. The store is a mechanism only; what gets stored is
/// decided by the aspects using it.
pub(crate) struct AmbientSlot<T: 'static> {
    key: &'static LocalKey<RefCell<Option<T>>>,
}

impl<T: Clone + 'static> AmbientSlot<T> {
    fn new(key: &'static LocalKey<RefCell<Option<T>>>) -> Self {
        Self { key }
    }

    pub(crate) fn activate(&self, value: Option<T>) -> ActivationToken<T> {
        let previous = self.key.with(|cell| cell.replace(value));
        ActivationToken {
            key: self.key,
            previous,
            _not_send: PhantomData,
        }
    }

    pub(crate) fn read(&self) -> Option<T> {
        self.key.with(|cell| cell.borrow().clone())
    }

    fn overwrite(&self, value: Option<T>) {
        self.key.with(|cell| {
            cell.replace(value);
        });
    }
}

pub(crate) struct ActivationToken<T: 'static> {
    key: &'static LocalKey<RefCell<Option<T>>>,
    previous: Option<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T: 'static> ActivationToken<T> {
    pub(crate) fn restore(self) {
        let Self { key, previous, .. } = self;
        key.with(move |cell| {
            cell.replace(previous);
        });
    }
}

fn descriptor_slot() -> AmbientSlot<Arc<InvocationDescriptor>> {
    AmbientSlot::new(&CURRENT_DESCRIPTOR)
}

pub(crate) fn capability_slot() -> AmbientSlot<bool> {
    AmbientSlot::new(&MATERIALIZE_ALLOWED)
}

/// Handle for one descriptor activation.
#[must_use = "pass the token to `deactivate_context` to restore the previous context"]
pub struct ContextToken(ActivationToken<Arc<InvocationDescriptor>>);

impl std::fmt::Debug for ContextToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextToken")
            .field("previous", &self.0.previous.as_ref().map(|d| d.step_name()))
            .finish()
    }
}

/// Make `descriptor` the current context for this thread.
pub fn activate_context(descriptor: Arc<InvocationDescriptor>) -> ContextToken {
    ContextToken(descriptor_slot().activate(Some(descriptor)))
}

/// Restore exactly the context that was active when `token` was issued.
pub fn deactivate_context(token: ContextToken) {
    token.0.restore();
}

/// The descriptor of the innermost active step on this thread, if any.
pub fn current_context() -> Option<Arc<InvocationDescriptor>> {
    descriptor_slot().read()
}

/// Run `f` with `descriptor` as the current context, restoring the previous one
/// on return or unwind.
pub fn with_context<R>(descriptor: Arc<InvocationDescriptor>, f: impl FnOnce() -> R) -> R {
    let _restore = scopeguard::guard(activate_context(descriptor), deactivate_context);
    f()
}

/// One entry of the step stack, keyed by the address of the descriptor the
/// executor hands to both `before` and `after` of the same invocation.
struct StepEntry {
    key: usize,
    token: ContextToken,
}

fn step_key(ctx: &InvocationDescriptor) -> usize {
    ctx as *const InvocationDescriptor as usize
}

/// Activate `ctx` and keep its token on this thread's step stack, for aspects
/// that activate in `before` and restore in `after`.
pub fn push_step_context(ctx: &InvocationDescriptor) {
    let token = activate_context(Arc::new(ctx.clone()));
    STEP_TOKENS.with(|tokens| {
        tokens.borrow_mut().push(StepEntry {
            key: step_key(ctx),
            token,
        })
    });
}

/// Restore the context that was active before the matching
/// [`push_step_context`] for `ctx`.
///
/// Entries pushed above it and never popped are discarded, so the outer step
/// still restores its own predecessor.
pub fn pop_step_context(ctx: &InvocationDescriptor) -> Result<(), AmbientError> {
    let key = step_key(ctx);
    let popped = STEP_TOKENS.with(|tokens| {
        let mut tokens = tokens.borrow_mut();
        let position = tokens.iter().rposition(|entry| entry.key == key)?;
        Some(tokens.split_off(position))
    });
    let mut popped = popped.ok_or(AmbientError::NoActiveStep)?.into_iter();
    if let Some(own) = popped.next() {
        drop(popped);
        deactivate_context(own.token);
    }
    Ok(())
}

/// Ambient state at executor entry. Restored when a `before` hook aborts the
/// pipeline, since no `after` hook will run to undo earlier activations.
pub(crate) struct Checkpoint {
    descriptor: Option<Arc<InvocationDescriptor>>,
    materialize: Option<bool>,
    depth: usize,
}

impl Checkpoint {
    pub(crate) fn capture() -> Self {
        Self {
            descriptor: descriptor_slot().read(),
            materialize: capability_slot().read(),
            depth: STEP_TOKENS.with(|tokens| tokens.borrow().len()),
        }
    }

    pub(crate) fn restore(self) {
        let abandoned = STEP_TOKENS.with(|tokens| {
            let mut tokens = tokens.borrow_mut();
            let depth = self.depth.min(tokens.len());
            tokens.split_off(depth)
        });
        drop(abandoned);
        descriptor_slot().overwrite(self.descriptor);
        capability_slot().overwrite(self.materialize);
    }
}

/// Ambient values captured on one thread for explicit forwarding to another
/// thread or task.
#[derive(Debug, Clone, Default)]
pub struct AmbientSnapshot {
    descriptor: Option<Arc<InvocationDescriptor>>,
    materialize: Option<bool>,
}

impl AmbientSnapshot {
    pub fn capture() -> Self {
        Self {
            descriptor: descriptor_slot().read(),
            materialize: capability_slot().read(),
        }
    }

    pub fn descriptor(&self) -> Option<&Arc<InvocationDescriptor>> {
        self.descriptor.as_ref()
    }

    pub fn materialization_allowed(&self) -> bool {
        self.materialize.unwrap_or(false)
    }

    /// Run `f` with the captured values active, restoring the current ones after.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let descriptor = descriptor_slot().activate(self.descriptor.clone());
        let materialize = capability_slot().activate(self.materialize);
        let _restore = scopeguard::guard((descriptor, materialize), |(descriptor, materialize)| {
            materialize.restore();
            descriptor.restore();
        });
        f()
    }

    /// Wrap a future so the captured values are active during each of its polls.
    pub fn instrument<F: Future>(self, future: F) -> Instrumented<F> {
        Instrumented {
            inner: Box::pin(future),
            snapshot: self,
        }
    }
}

/// Future returned by [`AmbientSnapshot::instrument`].
pub struct Instrumented<F> {
    inner: Pin<Box<F>>,
    snapshot: AmbientSnapshot,
}

impl<F: Future> Future for Instrumented<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let Self { inner, snapshot } = self.get_mut();
        snapshot.scope(|| inner.as_mut().poll(cx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::ContainerShape;

    fn descriptor(step: &str) -> Arc<InvocationDescriptor> {
        Arc::new(InvocationDescriptor::new(step, ContainerShape::Single))
    }

    fn current_step() -> Option<String> {
        current_context().map(|d| d.step_name().to_string())
    }

    #[test]
    fn test_nested_activation_restores_previous() {
        let outer = activate_context(descriptor("a"));
        let inner = activate_context(descriptor("b"));
        assert_eq!(current_step().as_deref(), Some("b"));

        deactivate_context(inner);
        assert_eq!(current_step().as_deref(), Some("a"));

        deactivate_context(outer);
        assert_eq!(current_step(), None);
    }

    #[test]
    fn test_out_of_order_deactivation_is_self_describing() {
        let outer = activate_context(descriptor("a"));
        let inner = activate_context(descriptor("b"));

        // the outer token restores "nothing active" regardless of the inner activation
        deactivate_context(outer);
        assert_eq!(current_step(), None);

        // the inner token restores what it replaced
        deactivate_context(inner);
        assert_eq!(current_step().as_deref(), Some("a"));

        descriptor_slot().overwrite(None);
    }

    #[test]
    fn test_with_context_restores_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            with_context(descriptor("boom"), || {
                assert_eq!(current_step().as_deref(), Some("boom"));
                panic!("inside scope");
            })
        });
        assert!(result.is_err());
        assert_eq!(current_step(), None);
    }

    #[test]
    fn test_step_stack_push_pop() {
        let outer = InvocationDescriptor::new("outer", ContainerShape::Single);
        let inner = InvocationDescriptor::new("inner", ContainerShape::Single);
        push_step_context(&outer);
        push_step_context(&inner);
        assert_eq!(current_step().as_deref(), Some("inner"));

        pop_step_context(&inner).unwrap();
        assert_eq!(current_step().as_deref(), Some("outer"));
        pop_step_context(&outer).unwrap();
        assert_eq!(current_step(), None);

        assert!(matches!(pop_step_context(&outer), Err(AmbientError::NoActiveStep)));
    }

    #[test]
    fn test_pop_skips_entries_left_by_nested_code() {
        let outer = InvocationDescriptor::new("outer", ContainerShape::Single);
        let forgotten = InvocationDescriptor::new("forgotten", ContainerShape::Single);
        push_step_context(&outer);
        push_step_context(&forgotten);
        assert_eq!(current_step().as_deref(), Some("forgotten"));

        pop_step_context(&outer).unwrap();
        assert_eq!(current_step(), None);
        assert!(pop_step_context(&forgotten).is_err());
    }

    #[test]
    fn test_checkpoint_discards_abandoned_steps() {
        let kept = InvocationDescriptor::new("kept", ContainerShape::Single);
        let abandoned = InvocationDescriptor::new("abandoned", ContainerShape::Single);
        push_step_context(&kept);
        let checkpoint = Checkpoint::capture();

        push_step_context(&abandoned);
        let _leaked = capability_slot().activate(Some(true));
        checkpoint.restore();

        assert_eq!(current_step().as_deref(), Some("kept"));
        assert_eq!(capability_slot().read(), None);
        assert!(pop_step_context(&abandoned).is_err());

        pop_step_context(&kept).unwrap();
        assert_eq!(current_step(), None);
        assert!(pop_step_context(&kept).is_err());
    }

    #[test]
    fn test_threads_are_isolated() {
        let token = activate_context(descriptor("parent"));

        let seen = std::thread::spawn(|| current_context().map(|d| d.step_name().to_string()))
            .join()
            .unwrap();
        assert_eq!(seen, None);

        let snapshot = AmbientSnapshot::capture();
        let forwarded = std::thread::spawn(move || snapshot.scope(current_step))
            .join()
            .unwrap();
        assert_eq!(forwarded.as_deref(), Some("parent"));

        deactivate_context(token);
    }
}
