// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Invocation Descriptor
//!
//! Immutable metadata identifying one unit of work. A descriptor is built once
//! through its `with_*` builders (each consumes `self` and returns a fresh value)
//! and is never edited afterwards. Restoring a previously active descriptor after
//! a nested call is therefore always correct.
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `step_name` | logical operation name |
//! | `container_shape` | `single`, `batch` or `workflow` |
//! | `boundary` | `none` (default), `geo`, `io`; anything else is kept as `Unrecognized` |
//! | `run_id`, `tenant`, `trace_id`, `span_id`, `config_hash` | optional correlation data |
//! | `package_versions` | ordered auxiliary version map |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerShape {
    Single,
    Batch,
    Workflow,
}

impl ContainerShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batch => "batch",
            Self::Workflow => "workflow",
        }
    }
}

impl fmt::Display for ContainerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown container shape '{0}'. Valid: single, batch, workflow.")]
pub struct InvalidShape(pub String);

impl FromStr for ContainerShape {
    type Err = InvalidShape;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "batch" => Ok(Self::Batch),
            "workflow" => Ok(Self::Workflow),
            _ => Err(InvalidShape(s.to_string())),
        }
    }
}

/// Whether an invocation crosses a service or resource edge.
///
/// Values that arrive from configuration or callers as free text are never
/// coerced: anything outside `none|geo|io` is carried as `Unrecognized` so the
/// contract policy can reject it before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Boundary {
    #[default]
    None,
    Geo,
    Io,
    Unrecognized(String),
}

impl Boundary {
    /// Exact, case-sensitive match. `"IO"` or `" geo "` stay `Unrecognized`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "none" => Self::None,
            "geo" => Self::Geo,
            "io" => Self::Io,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Geo => "geo",
            Self::Io => "io",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// `true` for `geo` and `io`.
    pub fn is_crossing(&self) -> bool {
        matches!(self, Self::Geo | Self::Io)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Boundary {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for Boundary {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Boundary> for String {
    fn from(boundary: Boundary) -> Self {
        boundary.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationDescriptor {
    step_name: String,
    container_shape: ContainerShape,
    #[serde(default)]
    boundary: Boundary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_hash: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    package_versions: BTreeMap<String, String>,
}

impl InvocationDescriptor {
    pub fn new(step_name: impl Into<String>, container_shape: ContainerShape) -> Self {
        Self {
            step_name: step_name.into(),
            container_shape,
            boundary: Boundary::None,
            run_id: None,
            tenant: None,
            trace_id: None,
            span_id: None,
            config_hash: None,
            package_versions: BTreeMap::new(),
        }
    }

    pub fn with_boundary(mut self, boundary: impl Into<Boundary>) -> Self {
        self.boundary = boundary.into();
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = Some(config_hash.into());
        self
    }

    pub fn with_package_version(mut self, package: impl Into<String>, version: impl Into<String>) -> Self {
        self.package_versions.insert(package.into(), version.into());
        self
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn container_shape(&self) -> ContainerShape {
        self.container_shape
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.config_hash.as_deref()
    }

    pub fn package_versions(&self) -> &BTreeMap<String, String> {
        &self.package_versions
    }
}
