// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Logging Aspect
//!
//! Structured start/end events per step, emitted through `tracing` under the
//! `wanaspects` target:
//!
//! - `step_start` at `DEBUG` from `before`
//! - `step_end` at `INFO` (or `ERROR` on failure) from `after`, carrying the
//!   status, the executor-measured `duration_ms`, and `error.kind`/`error.msg`
//!
//! Every present descriptor field is attached. The payload is built as a
//! [`StepEvent`] so the same record can be inspected or serialized elsewhere.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

use crate::domain::aspect::{Aspect, Completion, Next, StepError, StepResult, StepStatus};
use crate::domain::invocation::InvocationDescriptor;

pub(crate) const LOG_TARGET: &str = "wanaspects";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    pub event: &'static str,
    pub step: String,
    pub shape: &'static str,
    pub boundary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub package_versions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(rename = "error.kind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(rename = "error.msg", skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl StepEvent {
    pub fn start(ctx: &InvocationDescriptor) -> Self {
        Self::describe("step_start", ctx)
    }

    pub fn end(ctx: &InvocationDescriptor, completion: Completion<'_>) -> Self {
        let mut event = Self::describe("step_end", ctx);
        event.status = Some(completion.status().as_str());
        event.duration_ms = Some(completion.elapsed().as_nanos() as f64 / 1_000_000.0);
        if let Some(err) = completion.error() {
            event.error_kind = Some(err.kind().to_string());
            event.error_msg = Some(err.to_string());
        }
        event
    }

    fn describe(name: &'static str, ctx: &InvocationDescriptor) -> Self {
        Self {
            event: name,
            step: ctx.step_name().to_string(),
            shape: ctx.container_shape().as_str(),
            boundary: ctx.boundary().as_str().to_string(),
            run_id: ctx.run_id().map(str::to_string),
            tenant: ctx.tenant().map(str::to_string),
            trace_id: ctx.trace_id().map(str::to_string),
            span_id: ctx.span_id().map(str::to_string),
            config_hash: ctx.config_hash().map(str::to_string),
            package_versions: ctx.package_versions().clone(),
            status: None,
            duration_ms: None,
            error_kind: None,
            error_msg: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(StepStatus::Error.as_str())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn emit(&self) {
        let payload = self.to_json();
        match (self.event, self.is_error()) {
            ("step_start", _) => debug!(
                target: LOG_TARGET,
                event = self.event,
                step = %self.step,
                payload = %payload,
                "step_start"
            ),
            (_, true) => error!(
                target: LOG_TARGET,
                event = self.event,
                step = %self.step,
                status = self.status.unwrap_or_default(),
                duration_ms = self.duration_ms.unwrap_or_default(),
                error.kind = self.error_kind.as_deref().unwrap_or_default(),
                error.msg = self.error_msg.as_deref().unwrap_or_default(),
                payload = %payload,
                "step_end"
            ),
            (_, false) => info!(
                target: LOG_TARGET,
                event = self.event,
                step = %self.step,
                status = self.status.unwrap_or_default(),
                duration_ms = self.duration_ms.unwrap_or_default(),
                payload = %payload,
                "step_end"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAspect;

impl LoggingAspect {
    pub fn new() -> Self {
        Self
    }
}

impl Aspect for LoggingAspect {
    fn before(&self, ctx: &InvocationDescriptor) -> Result<(), StepError> {
        StepEvent::start(ctx).emit();
        Ok(())
    }

    fn around(&self, _ctx: &InvocationDescriptor, next: Next<'_>) -> StepResult {
        next.run()
    }

    fn after(&self, ctx: &InvocationDescriptor, completion: Completion<'_>) -> Result<(), StepError> {
        StepEvent::end(ctx, completion).emit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::{Boundary, ContainerShape};
    use std::time::Duration;

    fn ctx() -> InvocationDescriptor {
        InvocationDescriptor::new("load_tiles", ContainerShape::Batch)
            .with_boundary(Boundary::Geo)
            .with_run_id("run-1")
            .with_package_version("wanaspects-core", "0.4.0")
    }

    #[test]
    fn test_start_event_carries_present_fields_only() {
        let event = StepEvent::start(&ctx());
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["event"], "step_start");
        assert_eq!(json["shape"], "batch");
        assert_eq!(json["boundary"], "geo");
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["package_versions"]["wanaspects-core"], "0.4.0");
        assert!(json.get("tenant").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_end_event_reports_error() {
        let failed: StepResult = Err(StepError::msg("ValueError", "boom"));
        let event = StepEvent::end(&ctx(), Completion::of(&failed, Duration::from_millis(12)));
        assert!(event.is_error());
        assert_eq!(event.status, Some("error"));
        assert_eq!(event.duration_ms, Some(12.0));
        assert_eq!(event.error_kind.as_deref(), Some("ValueError"));
        assert_eq!(event.error_msg.as_deref(), Some("boom"));

        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["error.kind"], "ValueError");
    }

    #[test]
    fn test_end_event_success() {
        let done: StepResult = Ok(Box::new(3_u8));
        let event = StepEvent::end(&ctx(), Completion::of(&done, Duration::ZERO));
        assert!(!event.is_error());
        assert_eq!(event.status, Some("ok"));
        assert!(event.error_kind.is_none());
    }

    #[test]
    fn test_hooks_never_fail() {
        let aspect = LoggingAspect::new();
        let done: StepResult = Ok(Box::new(()));
        assert!(aspect.before(&ctx()).is_ok());
        assert!(aspect.after(&ctx(), Completion::of(&done, Duration::ZERO)).is_ok());
    }
}
