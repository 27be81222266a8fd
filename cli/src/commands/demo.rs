// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `wanaspects demo`: one step through the configured pipeline.
//!
//! The unit of work attempts a guarded materialization and forwards the
//! ambient context into a spawned task, so the effect of the boundary and of
//! the bundle can be observed from the command line.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use wanaspects_core::{
    current_context, guarded, AmbientSnapshot, AspectsConfig, Boundary, ContainerShape,
    InvocationDescriptor, OptimizedPipeline, PipelineExecutor, StepError,
};

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Step boundary (none, geo, io)
    #[arg(long, default_value = "none")]
    pub boundary: String,

    /// Aspect bundle to use instead of the configured one
    #[arg(long)]
    pub bundle: Option<String>,

    /// Step name
    #[arg(long, default_value = "demo_step")]
    pub step: String,

    /// Print the Prometheus exposition after the run
    #[arg(long)]
    pub metrics: bool,
}

/// What the demo step observed.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub run_id: String,
    pub materialized: Result<usize, String>,
    pub task_saw_step: Option<String>,
}

pub async fn execute(args: DemoArgs, config: &AspectsConfig, metrics: Option<&PrometheusHandle>) -> Result<()> {
    let report = run(&args, config).await?;

    println!("{}", "Demo step".bold());
    println!("  Run ID: {}", report.run_id);
    println!("  Boundary: {}", args.boundary);
    match &report.materialized {
        Ok(rows) => println!("  Materialization: {} ({} rows)", "allowed".green(), rows),
        Err(reason) => println!("  Materialization: {} ({})", "denied".yellow(), reason),
    }
    println!(
        "  Spawned task saw step: {}",
        report.task_saw_step.as_deref().unwrap_or("(none)")
    );

    if let Some(handle) = metrics {
        println!();
        println!("{}", "Metrics:".bold());
        print!("{}", handle.render());
    }

    Ok(())
}

/// Run the demo step and collect its observations.
pub async fn run(args: &DemoArgs, config: &AspectsConfig) -> Result<DemoReport> {
    let mut config = config.clone();
    if let Some(bundle) = &args.bundle {
        config.bundle = bundle.clone();
    }
    let pipeline = OptimizedPipeline::from_config(&config).context("Failed to build aspect pipeline")?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let descriptor = InvocationDescriptor::new(args.step.clone(), ContainerShape::Single)
        .with_boundary(Boundary::parse(&args.boundary))
        .with_run_id(run_id.clone())
        .with_package_version("wanaspects-core", env!("CARGO_PKG_VERSION"));

    let (materialized, task) = pipeline
        .execute(&descriptor, || -> Result<_, StepError> {
            let materialized = guarded(|| (0..3).collect::<Vec<u32>>())
                .map(|rows| rows.len())
                .map_err(|denied| denied.to_string());

            let snapshot = AmbientSnapshot::capture();
            let task = tokio::spawn(snapshot.instrument(async {
                current_context().map(|ctx| ctx.step_name().to_string())
            }));
            Ok((materialized, task))
        })
        .map_err(StepError::into_inner)
        .context("Demo step failed")?;

    let task_saw_step = task.await.context("Forwarded task failed")?;
    info!(run_id = %run_id, step = %args.step, "demo step finished");

    Ok(DemoReport {
        run_id,
        materialized,
        task_saw_step,
    })
}
