// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Structured Operation Events
//!
//! Consistent records for operations that happen inside a step but are not
//! steps themselves: database queries, cache operations, API calls.
//!
//! Each event is built, then [`emit`](DbQueryEvent::emit)ted once under the
//! `wanaspects` target: `INFO` on success, `ERROR` on failure. Attaching an
//! error always marks the event failed and adds `error_kind`/`error_message`.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::domain::aspect::StepError;
use crate::infrastructure::aspects::logging::LOG_TARGET;

/// Status codes at or above this are failures unless overridden.
pub const HTTP_ERROR_THRESHOLD: u16 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorFields {
    pub error_kind: String,
    pub error_message: String,
}

impl From<&StepError> for ErrorFields {
    fn from(err: &StepError) -> Self {
        Self {
            error_kind: err.kind().to_string(),
            error_message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbQueryEvent {
    pub statement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    pub success: bool,
    #[serde(flatten)]
    pub error: Option<ErrorFields>,
    #[serde(skip)]
    pub extra: BTreeMap<String, Value>,
}

impl DbQueryEvent {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: None,
            duration_ms: None,
            row_count: None,
            success: true,
            error: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success && self.error.is_none();
        self
    }

    pub fn with_error(mut self, err: &StepError) -> Self {
        self.success = false;
        self.error = Some(err.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn emit(&self) {
        emit_event("db.query", "db", self.success, self, &self.extra);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheOperationEvent {
    pub operation: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    pub success: bool,
    #[serde(flatten)]
    pub error: Option<ErrorFields>,
    #[serde(skip)]
    pub extra: BTreeMap<String, Value>,
}

impl CacheOperationEvent {
    pub fn new(operation: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            key: key.into(),
            namespace: None,
            hit: None,
            duration_ms: None,
            success: true,
            error: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_hit(mut self, hit: bool) -> Self {
        self.hit = Some(hit);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success && self.error.is_none();
        self
    }

    pub fn with_error(mut self, err: &StepError) -> Self {
        self.success = false;
        self.error = Some(err.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn emit(&self) {
        emit_event("cache.operation", "cache_event", self.success, self, &self.extra);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiCallEvent {
    pub method: String,
    pub url: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub success: bool,
    #[serde(flatten)]
    pub error: Option<ErrorFields>,
    #[serde(skip)]
    pub extra: BTreeMap<String, Value>,
}

impl ApiCallEvent {
    /// Success defaults to `status_code < 500`.
    pub fn new(method: impl Into<String>, url: impl Into<String>, status_code: u16) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status_code,
            duration_ms: None,
            request_id: None,
            success: status_code < HTTP_ERROR_THRESHOLD,
            error: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Overrides the status-derived outcome. An attached error still wins.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success && self.error.is_none();
        self
    }

    pub fn with_error(mut self, err: &StepError) -> Self {
        self.success = false;
        self.error = Some(err.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn emit(&self) {
        emit_event("api.call", "api_call", self.success, self, &self.extra);
    }
}

fn emit_event<P: Serialize>(
    message: &'static str,
    payload_key: &'static str,
    success: bool,
    payload: &P,
    extra: &BTreeMap<String, Value>,
) {
    let payload = serde_json::to_string(payload).unwrap_or_default();
    let extra = if extra.is_empty() {
        String::new()
    } else {
        serde_json::to_string(extra).unwrap_or_default()
    };

    if success {
        info!(target: LOG_TARGET, kind = payload_key, payload = %payload, extra = %extra, "{}", message);
    } else {
        error!(target: LOG_TARGET, kind = payload_key, payload = %payload, extra = %extra, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_json<P: Serialize>(event: &P) -> Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn test_db_query_success_and_failure() {
        let event = DbQueryEvent::new("SELECT 1")
            .with_parameters(json!({"id": 7}))
            .with_row_count(1)
            .with_duration_ms(2.5);
        let payload = as_json(&event);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["row_count"], 1);
        assert!(payload.get("error_kind").is_none());

        let err = StepError::msg("OperationalError", "connection reset");
        let failed = DbQueryEvent::new("SELECT 1").with_error(&err).with_success(true);
        let payload = as_json(&failed);
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error_kind"], "OperationalError");
        assert_eq!(payload["error_message"], "connection reset");
        failed.emit();
    }

    #[test]
    fn test_cache_operation_fields() {
        let event = CacheOperationEvent::new("get", "tile:42")
            .with_namespace("tiles")
            .with_hit(false)
            .with_extra("region", json!("eu"));
        let payload = as_json(&event);
        assert_eq!(payload["operation"], "get");
        assert_eq!(payload["hit"], false);
        assert_eq!(payload["namespace"], "tiles");
        assert!(payload.get("extra").is_none());
        assert_eq!(event.extra["region"], json!("eu"));
        event.emit();
    }

    #[test]
    fn test_api_call_success_follows_status_code() {
        assert!(ApiCallEvent::new("GET", "https://api.example.test", 404).success);
        assert!(!ApiCallEvent::new("GET", "https://api.example.test", 503).success);
        assert!(ApiCallEvent::new("GET", "https://api.example.test", 503).with_success(true).success);

        let err = StepError::msg("TimeoutError", "deadline exceeded");
        let event = ApiCallEvent::new("POST", "https://api.example.test", 200)
            .with_request_id("req-1")
            .with_error(&err);
        assert!(!event.success);
        assert_eq!(as_json(&event)["request_id"], "req-1");
    }
}
