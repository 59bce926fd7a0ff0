//! Request correlation and attempt spans
//!
//! Every creation request gets a `CorrelationId` that appears on all of its
//! log events, and a root `TraceContext`. Each submission attempt opens an
//! attempt span under the root.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one creation request across all of its events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Fresh random (v4) id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Span within a creation request's trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    /// Shared by the root span and all attempt spans of one request
    pub trace_id: String,
    pub span_id: String,
    pub correlation_id: CorrelationId,
    /// `None` for the root span
    pub parent_span_id: Option<String>,
    pub operation: String,
    /// Submission attempt this span covers, when it is an attempt span
    pub attempt: Option<u32>,
    /// Span start, Unix epoch milliseconds
    pub timestamp_ms: i64,
}

impl TraceContext {
    /// Root span under a fresh correlation id
    pub fn new(operation: &str) -> Self {
        Self::with_correlation(operation, CorrelationId::new())
    }

    /// Root span for a request already holding `correlation_id`
    pub fn with_correlation(operation: &str, correlation_id: CorrelationId) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            correlation_id,
            parent_span_id: None,
            operation: operation.to_owned(),
            attempt: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Child span named `operation`
    pub fn child_span(&self, operation: &str) -> Self {
        Self {
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_owned(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            ..self.clone()
        }
    }

    /// Child span covering submission attempt `attempt`
    pub fn attempt_span(&self, attempt: u32) -> Self {
        Self {
            attempt: Some(attempt),
            ..self.child_span(&format!("attempt_{}", attempt))
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Milliseconds since the span opened
    pub fn elapsed_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() - self.timestamp_ms
    }
}
