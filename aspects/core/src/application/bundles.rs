// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Aspect Bundles
//!
//! Pre-assembled aspect sequences. Order matters: the first aspect is the
//! outermost wrapper and the first to observe `before`/`after`.
//!
//! | Bundle | Sequence |
//! |--------|----------|
//! | `default` | context, logging, tracing, metrics, contract |
//! | `dev` | context, smart logging (development), tracing, metrics, contract |
//! | `prod` | conditional context, smart logging (production), tracing, sampled metrics |
//!
//! The configuration is consulted once, when the bundle is built.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::aspect::Aspect;
use crate::domain::config::{AspectsConfig, ConfigError};
use crate::domain::sampling::{LoggingTier, PropagationPolicy};
use crate::infrastructure::aspects::{
    ConditionalContextPropagationAspect, ContextPropagationAspect, ContractAspect, LoggingAspect,
    MetricsAspect, SampledMetricsAspect, SmartLoggingAspect, TracingAspect,
};

pub const DEFAULT_PROD_SAMPLE_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleKind {
    #[default]
    Default,
    Dev,
    Prod,
}

impl BundleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    /// Case-insensitive; unknown names select [`BundleKind::Default`].
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(bundle = name, "unknown aspect bundle, using default");
            Self::Default
        })
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BundleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "dev" | "development" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(format!("unknown bundle '{}'", other)),
        }
    }
}

pub fn default_bundle() -> Vec<Arc<dyn Aspect>> {
    assemble_default(ContractAspect::new())
}

pub fn dev_bundle() -> Vec<Arc<dyn Aspect>> {
    assemble_dev(ContractAspect::new())
}

fn assemble_default(contract: ContractAspect) -> Vec<Arc<dyn Aspect>> {
    vec![
        Arc::new(ContextPropagationAspect::new()),
        Arc::new(LoggingAspect::new()),
        Arc::new(TracingAspect::new()),
        Arc::new(MetricsAspect::new()),
        Arc::new(contract),
    ]
}

fn assemble_dev(contract: ContractAspect) -> Vec<Arc<dyn Aspect>> {
    vec![
        Arc::new(ContextPropagationAspect::new()),
        Arc::new(SmartLoggingAspect::new(LoggingTier::Development)),
        Arc::new(TracingAspect::new()),
        Arc::new(MetricsAspect::new()),
        Arc::new(contract),
    ]
}

/// Minimal-overhead sequence: propagation only where it matters, logging of
/// errors and boundary crossings, one in `⌈1/sample_rate⌉` successes measured.
pub fn prod_bundle(sample_rate: f64) -> Result<Vec<Arc<dyn Aspect>>, ConfigError> {
    let metrics = SampledMetricsAspect::new(sample_rate)?;
    let aspects: Vec<Arc<dyn Aspect>> = vec![
        Arc::new(ConditionalContextPropagationAspect::new(PropagationPolicy::boundaries_only())),
        Arc::new(SmartLoggingAspect::new(LoggingTier::Production)),
        Arc::new(TracingAspect::new()),
        Arc::new(metrics),
    ];
    Ok(aspects)
}

/// Bundle named by `config.bundle`, with the contract aspect limited to
/// `config.boundary_allow`.
pub fn bundle_from_config(config: &AspectsConfig) -> Result<Vec<Arc<dyn Aspect>>, ConfigError> {
    let kind = BundleKind::from_name(&config.bundle);
    let contract = ContractAspect::with_allowed(config.boundary_allow.iter().cloned());

    let aspects = match kind {
        BundleKind::Default => assemble_default(contract),
        BundleKind::Dev => assemble_dev(contract),
        BundleKind::Prod => prod_bundle(config.metrics_sample_rate)?,
    };

    debug!(
        bundle = %kind,
        aspects = ?aspects.iter().map(|aspect| aspect.name()).collect::<Vec<_>>(),
        "built aspect bundle"
    );
    Ok(aspects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(aspects: &[Arc<dyn Aspect>]) -> Vec<&str> {
        aspects.iter().map(|aspect| aspect.name()).collect()
    }

    #[test]
    fn test_bundle_kind_parsing() {
        assert_eq!("PROD".parse::<BundleKind>().unwrap(), BundleKind::Prod);
        assert_eq!("Dev".parse::<BundleKind>().unwrap(), BundleKind::Dev);
        assert_eq!(BundleKind::from_name("staging"), BundleKind::Default);
    }

    #[test]
    fn test_default_bundle_order() {
        assert_eq!(
            names(&default_bundle()),
            vec![
                "ContextPropagationAspect",
                "LoggingAspect",
                "TracingAspect",
                "MetricsAspect",
                "ContractAspect"
            ]
        );
    }

    #[test]
    fn test_prod_bundle_has_no_contract() {
        let aspects = prod_bundle(DEFAULT_PROD_SAMPLE_RATE).unwrap();
        assert_eq!(
            names(&aspects),
            vec![
                "ConditionalContextPropagationAspect",
                "SmartLoggingAspect",
                "TracingAspect",
                "SampledMetricsAspect"
            ]
        );
        assert!(prod_bundle(0.0).is_err());
    }

    #[test]
    fn test_bundle_from_config_selects_by_name() {
        let config = AspectsConfig {
            bundle: "dev".to_string(),
            ..AspectsConfig::default()
        };
        let aspects = bundle_from_config(&config).unwrap();
        assert_eq!(names(&aspects)[1], "SmartLoggingAspect");
        assert_eq!(aspects.len(), dev_bundle().len());

        let config = AspectsConfig {
            bundle: "unheard-of".to_string(),
            ..AspectsConfig::default()
        };
        assert_eq!(names(&bundle_from_config(&config).unwrap()), names(&default_bundle()));
    }
}
