// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Aspects Configuration
//
// Selects which aspect bundle a pipeline is built from and how the ambient
// observability stack behaves. Consulted once per pipeline construction, never
// per invocation.
// - YAML file discovered by precedence (CLI path, env var, cwd, home, system)
// - WANCHAIN_* environment variables always win over the file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::invocation::Boundary;

pub const CONFIG_PATH_ENV: &str = "WANASPECTS_CONFIG_PATH";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample rate must be in (0.0, 1.0], got {0}")]
    InvalidSampleRate(f64),

    #[error("Unknown logging tier '{0}'. Valid: development, production, debug.")]
    UnknownLoggingTier(String),

    #[error("Unknown log level '{0}'. Valid: trace, debug, info, warn, error.")]
    UnknownLogLevel(String),

    #[error("boundary_allow entry '{0}' is not a crossing boundary (geo|io)")]
    InvalidBoundaryAllow(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectsConfig {
    /// Master switch for telemetry export (metrics recorder)
    #[serde(default)]
    pub enabled: bool,

    /// Aspect bundle: "default", "dev" or "prod"
    #[serde(default = "default_bundle_name")]
    pub bundle: String,

    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of compact text
    #[serde(default = "default_true")]
    pub log_json: bool,

    /// Install a metrics recorder (requires `enabled`)
    #[serde(default)]
    pub metrics_enabled: bool,

    /// Fraction of successful calls the prod bundle records metrics for
    #[serde(default = "default_metrics_sample_rate")]
    pub metrics_sample_rate: f64,

    /// Boundaries at which guarded materialization is permitted
    #[serde(default = "default_boundary_allow")]
    pub boundary_allow: Vec<Boundary>,

    /// Row cap for development previews
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_peek_max_rows: Option<u64>,
}

impl Default for AspectsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bundle: default_bundle_name(),
            log_level: default_log_level(),
            log_json: true,
            metrics_enabled: false,
            metrics_sample_rate: default_metrics_sample_rate(),
            boundary_allow: default_boundary_allow(),
            dev_peek_max_rows: None,
        }
    }
}

impl AspectsConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. WANASPECTS_CONFIG_PATH environment variable
    /// 2. ./wanaspects.yaml (working directory)
    /// 3. ~/.wanaspects/config.yaml (user home)
    /// 4. /etc/wanaspects/config.yaml (system, Unix) or C:\ProgramData\Wanaspects\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./wanaspects.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".wanaspects").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/wanaspects/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Wanaspects\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply WANCHAIN_* environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup; invalid values are logged and ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("WANCHAIN_ASPECTS_ENABLED") {
            if let Some(flag) = override_bool("WANCHAIN_ASPECTS_ENABLED", &val) {
                self.enabled = flag;
            }
        }

        if let Some(val) = lookup("WANCHAIN_ASPECTS_BUNDLE") {
            tracing::info!("Environment override: WANCHAIN_ASPECTS_BUNDLE={}", val);
            self.bundle = val.trim().to_string();
        }

        if let Some(val) = lookup("WANCHAIN_LOG_LEVEL") {
            self.log_level = val.trim().to_string();
        }

        if let Some(val) = lookup("WANCHAIN_LOG_JSON") {
            if let Some(flag) = override_bool("WANCHAIN_LOG_JSON", &val) {
                self.log_json = flag;
            }
        }

        if let Some(val) = lookup("WANCHAIN_METRICS_ENABLED") {
            if let Some(flag) = override_bool("WANCHAIN_METRICS_ENABLED", &val) {
                self.metrics_enabled = flag;
            }
        }

        if let Some(val) = lookup("WANCHAIN_METRICS_SAMPLE_RATE") {
            match val.trim().parse::<f64>() {
                Ok(rate) => self.metrics_sample_rate = rate,
                Err(_) => tracing::warn!(
                    "Invalid value for WANCHAIN_METRICS_SAMPLE_RATE: '{}'. Expected a number. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("WANCHAIN_BOUNDARY_ALLOW") {
            self.boundary_allow = val
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(Boundary::parse)
                .collect();
        }

        if let Some(val) = lookup("WANCHAIN_DEV_PEEK_MAX_ROWS") {
            let trimmed = val.trim();
            if trimmed.is_empty() {
                self.dev_peek_max_rows = None;
            } else {
                match trimmed.parse::<u64>() {
                    Ok(rows) => self.dev_peek_max_rows = Some(rows),
                    Err(_) => tracing::warn!(
                        "Invalid value for WANCHAIN_DEV_PEEK_MAX_ROWS: '{}'. Expected an integer. Ignoring.",
                        val
                    ),
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.metrics_sample_rate.is_finite()
            || self.metrics_sample_rate <= 0.0
            || self.metrics_sample_rate > 1.0
        {
            return Err(ConfigError::InvalidSampleRate(self.metrics_sample_rate));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::UnknownLogLevel(self.log_level.clone()));
        }

        for boundary in &self.boundary_allow {
            if !boundary.is_crossing() {
                return Err(ConfigError::InvalidBoundaryAllow(boundary.to_string()));
            }
        }

        Ok(())
    }
}

fn override_bool(key: &str, val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => {
            tracing::info!("Environment override: {}=true", key);
            Some(true)
        }
        "false" | "0" | "no" | "off" => {
            tracing::info!("Environment override: {}=false", key);
            Some(false)
        }
        _ => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                key,
                val
            );
            None
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bundle_name() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_sample_rate() -> f64 {
    0.1
}

fn default_boundary_allow() -> Vec<Boundary> {
    vec![Boundary::Geo, Boundary::Io]
}
