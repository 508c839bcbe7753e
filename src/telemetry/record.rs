//! Usage records emitted once per proxied call.

use std::fmt::Write as _;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::cost::CostOutcome;
use crate::types::{CallMetadata, TokenUsage};
use crate::usage::UsageExtract;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Success,
    Failure,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Success => "success",
            RecordKind::Failure => "failure",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start and end of a backend call as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTiming {
    pub start: SystemTime,
    pub end: SystemTime,
}

impl CallTiming {
    pub fn new(start: SystemTime, end: SystemTime) -> Self {
        Self { start, end }
    }

    /// Elapsed milliseconds; zero when the clock went backwards.
    pub fn latency_ms(&self) -> u64 {
        self.end
            .duration_since(self.start)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// One call's usage and cost. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub kind: RecordKind,
    pub preview: String,
    pub model: Option<String>,
    pub model_group: Option<String>,
    pub model_id: Option<String>,
    pub deployment: Option<String>,
    pub api_base: Option<String>,
    pub usage: TokenUsage,
    /// Absent when the cost could not be computed.
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    pub latency_ms: u64,
}

impl UsageRecord {
    pub fn from_parts(
        kind: RecordKind,
        meta: &CallMetadata,
        extract: UsageExtract,
        cost: Option<&CostOutcome>,
        timing: CallTiming,
    ) -> Self {
        let dep = meta.deployment();
        let (exception, traceback) = match kind {
            RecordKind::Failure => (meta.exception.clone(), meta.traceback_exception.clone()),
            RecordKind::Success => (None, None),
        };
        Self {
            kind,
            preview: extract.preview,
            model: meta.model.clone(),
            model_group: dep.model_group.clone(),
            model_id: dep.model_info.id.clone(),
            deployment: dep.deployment.clone(),
            api_base: dep.api_base.clone(),
            usage: extract.usage,
            cost: cost.and_then(CostOutcome::amount),
            cost_error: cost.and_then(CostOutcome::failure).map(str::to_string),
            exception,
            traceback,
            latency_ms: timing.latency_ms(),
        }
    }

    /// Multi-line human-readable form used by the console sink.
    pub fn render(&self) -> String {
        fn or_dash(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("-")
        }
        let mut out = String::new();
        let _ = writeln!(out, "event: {}", self.kind);
        let _ = writeln!(out, "prompt: {}", self.preview);
        let _ = writeln!(out, "model: {}", or_dash(&self.model));
        let _ = writeln!(out, "model_group: {}", or_dash(&self.model_group));
        let _ = writeln!(out, "model_id: {}", or_dash(&self.model_id));
        let _ = writeln!(out, "deployment: {}", or_dash(&self.deployment));
        let _ = writeln!(out, "api_base: {}", or_dash(&self.api_base));
        let _ = writeln!(out, "tokens: {}", self.usage.total_tokens);
        let _ = writeln!(out, "input_tokens: {}", self.usage.prompt_tokens);
        let _ = writeln!(out, "output_tokens: {}", self.usage.completion_tokens);
        match (self.cost, &self.cost_error) {
            (Some(c), _) => {
                let _ = writeln!(out, "cost: {}", c);
            }
            (None, Some(err)) => {
                let _ = writeln!(out, "cost: - (computation failed: {})", err);
            }
            (None, None) => {
                let _ = writeln!(out, "cost: -");
            }
        }
        let _ = write!(out, "latency_ms: {}", self.latency_ms);
        if self.kind == RecordKind::Failure {
            let _ = write!(
                out,
                "\nexception: {}\ntraceback: {}",
                or_dash(&self.exception),
                or_dash(&self.traceback)
            );
        }
        out
    }
}

/// What the recorder hands to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UsageEvent {
    Usage(UsageRecord),
    /// A success event arrived without a response object.
    MissingResponse {
        kind: RecordKind,
        model: Option<String>,
    },
}

impl UsageEvent {
    pub fn record(&self) -> Option<&UsageRecord> {
        match self {
            UsageEvent::Usage(r) => Some(r),
            UsageEvent::MissingResponse { .. } => None,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, UsageEvent::MissingResponse { .. })
    }

    pub fn render(&self) -> String {
        match self {
            UsageEvent::Usage(r) => r.render(),
            UsageEvent::MissingResponse { kind, model } => format!(
                "warning: response missing for event={}, model={}",
                kind,
                model.as_deref().unwrap_or("-")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(kind: RecordKind) -> UsageRecord {
        UsageRecord {
            kind,
            preview: "hello there".into(),
            model: Some("qwen-7b".into()),
            model_group: Some("local".into()),
            model_id: None,
            deployment: None,
            api_base: Some("http://localhost:11434".into()),
            usage: TokenUsage::new(3, 4, 7),
            cost: None,
            cost_error: Some("no pricing".into()),
            exception: Some("TimeoutError".into()),
            traceback: None,
            latency_ms: 12,
        }
    }

    #[test]
    fn test_latency_never_negative() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = t0 + Duration::from_millis(250);
        assert_eq!(CallTiming::new(t0, t1).latency_ms(), 250);
        assert_eq!(CallTiming::new(t1, t0).latency_ms(), 0);
    }

    #[test]
    fn test_render_failure_lines() {
        let text = record(RecordKind::Failure).render();
        assert!(text.contains("prompt: hello there\n"));
        assert!(text.contains("model_id: -\n"));
        assert!(text.contains("tokens: 7\n"));
        assert!(text.contains("cost: - (computation failed: no pricing)\n"));
        assert!(text.ends_with("exception: TimeoutError\ntraceback: -"));
    }

    #[test]
    fn test_render_success_has_no_exception() {
        let text = record(RecordKind::Success).render();
        assert!(!text.contains("exception:"));
    }

    #[test]
    fn test_event_serializes_tagged() {
        let ev = UsageEvent::MissingResponse {
            kind: RecordKind::Success,
            model: Some("m".into()),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "missing_response");
        assert_eq!(v["kind"], "success");
    }
}
