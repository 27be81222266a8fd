// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ambient context visibility through pipelines, threads and async tasks.

use std::sync::Arc;

use wanaspects_core::{
    current_context, default_bundle, dev_bundle, guarded, pop_step_context, prod_bundle,
    push_step_context, AmbientSnapshot, Aspect, AspectPipeline, Boundary, ContainerShape,
    ContextPropagationAspect, InvocationDescriptor, OptimizedPipeline, PipelineExecutor,
};

fn current_step() -> Option<String> {
    current_context().map(|d| d.step_name().to_string())
}

#[test]
fn test_deep_code_reads_step_descriptor() {
    fn deeply_nested() -> Option<(String, Option<String>)> {
        current_context().map(|d| (d.step_name().to_string(), d.tenant().map(str::to_string)))
    }

    let pipeline = AspectPipeline::new(default_bundle());
    let ctx = InvocationDescriptor::new("enrich", ContainerShape::Workflow).with_tenant("acme");
    let seen = pipeline.execute(&ctx, || Ok(deeply_nested())).unwrap();

    assert_eq!(seen, Some(("enrich".to_string(), Some("acme".to_string()))));
    assert_eq!(current_step(), None);
}

#[test]
fn test_context_restored_after_failure() {
    let pipeline = OptimizedPipeline::new(dev_bundle());
    let ctx = InvocationDescriptor::new("fails", ContainerShape::Single);
    let result: Result<(), _> = pipeline.execute(&ctx, || {
        Err(wanaspects_core::StepError::msg("ValueError", "boom"))
    });
    assert!(result.is_err());
    assert_eq!(current_step(), None);
}

#[test]
fn test_step_unwinds_when_nested_code_never_pops() {
    let aspects = || vec![Arc::new(ContextPropagationAspect::new()) as Arc<dyn Aspect>];
    let outer = InvocationDescriptor::new("s", ContainerShape::Single);

    let leak = || {
        let nested = InvocationDescriptor::new("nested", ContainerShape::Single);
        push_step_context(&nested);
        Ok(current_step())
    };

    let seen = AspectPipeline::new(aspects()).execute(&outer, leak).unwrap();
    assert_eq!(seen.as_deref(), Some("nested"));
    assert_eq!(current_step(), None);

    let seen = OptimizedPipeline::new(aspects()).execute(&outer, leak).unwrap();
    assert_eq!(seen.as_deref(), Some("nested"));
    assert_eq!(current_step(), None);

    // the abandoned entry was discarded with the outer step
    assert!(pop_step_context(&outer).is_err());
}

#[test]
fn test_spawned_thread_sees_nothing_unless_forwarded() {
    let pipeline = AspectPipeline::new(default_bundle());
    let ctx = InvocationDescriptor::new("fan_out", ContainerShape::Batch).with_boundary(Boundary::Io);

    let (implicit, forwarded, allowed) = pipeline
        .execute(&ctx, || {
            let implicit = std::thread::spawn(current_step).join().unwrap_or_default();
            let snapshot = AmbientSnapshot::capture();
            let (forwarded, allowed) = std::thread::spawn(move || {
                snapshot.scope(|| (current_step(), guarded(|| ()).is_ok()))
            })
            .join()
            .unwrap_or_default();
            Ok((implicit, forwarded, allowed))
        })
        .unwrap();

    assert_eq!(implicit, None);
    assert_eq!(forwarded.as_deref(), Some("fan_out"));
    assert!(allowed);
}

#[test]
fn test_prod_bundle_propagates_only_boundary_or_traced_steps() {
    let pipeline = OptimizedPipeline::new(prod_bundle(0.1).unwrap());

    let plain = InvocationDescriptor::new("plain", ContainerShape::Single);
    assert_eq!(pipeline.execute(&plain, || Ok(current_step())).unwrap(), None);

    let geo = plain.clone().with_boundary(Boundary::Geo);
    assert_eq!(pipeline.execute(&geo, || Ok(current_step())).unwrap().as_deref(), Some("plain"));

    let traced = InvocationDescriptor::new("traced", ContainerShape::Single).with_trace_id("t-1");
    assert_eq!(pipeline.execute(&traced, || Ok(current_step())).unwrap().as_deref(), Some("traced"));

    assert_eq!(current_step(), None);
}

#[tokio::test]
async fn test_instrumented_task_observes_forwarded_context() {
    let ctx = Arc::new(InvocationDescriptor::new("async_step", ContainerShape::Single));
    let snapshot = wanaspects_core::with_context(ctx, AmbientSnapshot::capture);

    let forwarded = tokio::spawn(snapshot.instrument(async {
        tokio::task::yield_now().await;
        current_step()
    }));
    let bare = tokio::spawn(async { current_step() });

    assert_eq!(forwarded.await.unwrap().as_deref(), Some("async_step"));
    assert_eq!(bare.await.unwrap(), None);
    assert_eq!(current_step(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_tasks_keep_their_own_context() {
    let mut handles = Vec::new();
    for index in 0..8 {
        let ctx = Arc::new(InvocationDescriptor::new(format!("task_{}", index), ContainerShape::Single));
        let snapshot = wanaspects_core::with_context(ctx, AmbientSnapshot::capture);
        handles.push(tokio::spawn(snapshot.instrument(async move {
            for _ in 0..3 {
                tokio::task::yield_now().await;
                assert_eq!(current_step(), Some(format!("task_{}", index)));
            }
            index
        })));
    }

    for (index, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), index);
    }
}
