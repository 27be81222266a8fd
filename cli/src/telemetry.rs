// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process-wide logging and metrics installation.
//!
//! Both are global: call once, early in `main`.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use wanaspects_core::AspectsConfig;

/// Initialize tracing subscriber for logging
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.with_target(false).compact().try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(())
}

/// Install the Prometheus recorder when the configuration asks for it, or when
/// `force` is set. Returns the handle used to render the exposition text.
pub fn init_metrics(config: &AspectsConfig, force: bool) -> Result<Option<PrometheusHandle>> {
    if !(force || (config.enabled && config.metrics_enabled)) {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    tracing::debug!("prometheus recorder installed");
    Ok(Some(handle))
}
