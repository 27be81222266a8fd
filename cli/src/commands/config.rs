// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `wanaspects config`: inspect, check and scaffold the pipeline configuration.
//!
//! Every subcommand goes through the same discovery as the runtime, so what
//! `show` prints is what `demo` executes with.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use wanaspects_core::domain::config::CONFIG_PATH_ENV;
use wanaspects_core::{bundle_from_config, AspectsConfig, BundleKind, SamplingPolicy};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (file + WANCHAIN_* overrides)
    Show {
        /// Also list the discovery order and the file that won
        #[arg(long)]
        paths: bool,
    },

    /// Check a configuration and assemble its aspect bundle
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a starter configuration
    Generate {
        #[arg(short, long, default_value = "./wanaspects.yaml")]
        output: PathBuf,

        /// Use the annotated template
        #[arg(long)]
        examples: bool,

        /// Preselect a bundle (default, dev, prod)
        #[arg(long)]
        bundle: Option<BundleKind>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate {
            output,
            examples,
            bundle,
            force,
        } => generate(&output, examples, bundle, force),
    }
}

/// Effective configuration for commands that run the pipeline.
///
/// An explicit `--config` path (or `WANASPECTS_CONFIG_PATH`) that is missing or
/// invalid is an error; only the absence of any file falls back to defaults.
pub fn load(config_path: Option<PathBuf>) -> Result<AspectsConfig> {
    let config = AspectsConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        let active = match &config_override {
            Some(path) => path.display().to_string(),
            None => AspectsConfig::discover_config()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(defaults)".to_string()),
        };
        let from_env = std::env::var(CONFIG_PATH_ENV).ok();
        let candidates = [
            (
                "--config",
                config_override.as_ref().map(|p| p.display().to_string()),
            ),
            (CONFIG_PATH_ENV, from_env),
            ("cwd", Some("./wanaspects.yaml".to_string())),
            ("user", Some("~/.wanaspects/config.yaml".to_string())),
            ("system", Some("/etc/wanaspects/config.yaml".to_string())),
        ];

        println!("{}", "Discovery order:".bold());
        for (rank, (source, path)) in candidates.iter().enumerate() {
            let path = path.as_deref().unwrap_or("(not set)");
            println!("  {}. {:<24} {}", rank + 1, source, path.dimmed());
        }
        println!("  Using: {}", active.cyan());
        println!();
    }

    let config = AspectsConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    print_config(&config);
    Ok(())
}

/// Human-readable summary shared by `config show` and `diag`.
pub fn print_config(config: &AspectsConfig) {
    println!("{}", "Pipeline:".bold());
    println!("  Enabled: {}", config.enabled);
    println!(
        "  Bundle: {} (effective: {})",
        config.bundle,
        BundleKind::from_name(&config.bundle)
    );
    let allow: Vec<&str> = config.boundary_allow.iter().map(|b| b.as_str()).collect();
    println!("  Boundary allow: {}", allow.join(", "));
    if let Some(rows) = config.dev_peek_max_rows {
        println!("  Dev peek max rows: {}", rows);
    }
    println!();

    println!("{}", "Observability:".bold());
    println!("  Log level: {}", config.log_level);
    println!("  JSON logs: {}", config.log_json);
    println!("  Metrics: {}", config.enabled && config.metrics_enabled);
    println!("  Metrics sample rate: {}", config.metrics_sample_rate);
    println!();
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let config = load(config_path)?;

    if config.bundle.parse::<BundleKind>().is_err() {
        println!(
            "{} unknown bundle '{}', the default bundle will be used",
            "!".yellow(),
            config.bundle
        );
    }

    let aspects = bundle_from_config(&config).context("Failed to assemble aspect bundle")?;
    let names: Vec<&str> = aspects.iter().map(|aspect| aspect.name()).collect();
    let sampling = SamplingPolicy::new(config.metrics_sample_rate)?;

    println!("{}", "✓ Configuration is valid".green());
    println!("  Aspects: {}", names.join(" → "));
    println!("  Sampling: 1 in {} successful steps", sampling.interval());
    Ok(())
}

/// Starter YAML, optionally with the `bundle:` entry preselected.
fn render_template(with_examples: bool, bundle: Option<BundleKind>) -> String {
    let template = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    let Some(bundle) = bundle else {
        return template.to_string();
    };
    template
        .lines()
        .map(|line| {
            if line.starts_with("bundle:") {
                format!("bundle: {}", bundle.as_str())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

pub fn generate(output: &Path, with_examples: bool, bundle: Option<BundleKind>, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to replace it)", output.display());
    }

    std::fs::write(output, render_template(with_examples, bundle))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_templates_load_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        for examples in [false, true] {
            let path = dir.path().join(format!("wanaspects-{}.yaml", examples));
            generate(&path, examples, None, false).unwrap();

            let config = load(Some(path)).unwrap();
            assert!(config.enabled);
            assert_eq!(config.bundle, "default");
        }
    }

    #[test]
    fn test_generate_preselects_bundle_and_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wanaspects.yaml");

        generate(&path, true, Some(BundleKind::Prod), false).unwrap();
        assert_eq!(AspectsConfig::from_yaml_file(&path).unwrap().bundle, "prod");

        assert!(generate(&path, false, None, false).is_err());
        assert_eq!(AspectsConfig::from_yaml_file(&path).unwrap().bundle, "prod");

        generate(&path, false, Some(BundleKind::Dev), true).unwrap();
        assert_eq!(AspectsConfig::from_yaml_file(&path).unwrap().bundle, "dev");
    }

    #[test]
    fn test_load_fails_on_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");

        let err = load(Some(missing)).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Failed to load configuration"));
        assert!(message.contains("absent.yaml"));
    }

    #[test]
    fn test_load_rejects_unparsable_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();

        let garbled = dir.path().join("garbled.yaml");
        std::fs::write(&garbled, "bundle: [unterminated\n").unwrap();
        assert!(load(Some(garbled)).is_err());

        let invalid = dir.path().join("invalid.yaml");
        std::fs::write(&invalid, "metrics_sample_rate: -0.5\n").unwrap();
        assert!(load(Some(invalid)).is_err());

        let valid = dir.path().join("valid.yaml");
        std::fs::write(&valid, "bundle: dev\n").unwrap();
        assert_eq!(load(Some(valid)).unwrap().bundle, "dev");
    }

    #[test]
    fn test_validate_rejects_bad_sample_rate_and_case_folded_boundaries() {
        let dir = tempfile::tempdir().unwrap();

        let rate = dir.path().join("rate.yaml");
        std::fs::write(&rate, "metrics_sample_rate: 1.5\n").unwrap();
        assert!(validate(Some(rate)).is_err());

        let allow = dir.path().join("allow.yaml");
        std::fs::write(&allow, "boundary_allow: [IO]\n").unwrap();
        assert!(validate(Some(allow)).is_err());
    }
}
