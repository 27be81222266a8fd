// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `wanaspects diag`: environment and effective-configuration report.

use anyhow::Result;
use colored::Colorize;

use wanaspects_core::{bundle_from_config, AspectsConfig, SamplingPolicy};

use super::config::print_config;

pub async fn execute(config: &AspectsConfig) -> Result<()> {
    println!("{}", "wanaspects diagnostics".bold());
    println!("  Timestamp: {}", chrono::Utc::now().to_rfc3339());
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    print_config(config);

    println!("{}", "Aspects:".bold());
    match bundle_from_config(config) {
        Ok(aspects) => {
            for (position, aspect) in aspects.iter().enumerate() {
                println!("  {}. {}", position + 1, aspect.name());
            }
        }
        Err(e) => println!("  {} {}", "✗".red(), e),
    }
    match SamplingPolicy::new(config.metrics_sample_rate) {
        Ok(policy) => println!("  Sampling: 1 in {} successful steps", policy.interval()),
        Err(e) => println!("  {} {}", "✗".red(), e),
    }
    println!();

    match config.validate() {
        Ok(()) => println!("{}", "✓ Configuration is valid".green()),
        Err(e) => println!("{}", format!("✗ {}", e).red()),
    }

    Ok(())
}
