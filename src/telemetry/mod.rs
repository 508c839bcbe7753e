//! 遥测模块：用量记录及其输出目标。
//!
//! # Telemetry Module
//!
//! Usage records and the sinks they are written to.
//!
//! Emission is best effort: a sink failure is logged and swallowed, it never
//! reaches the proxied caller.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`UsageRecord`] | Per-call usage, cost and routing metadata |
//! | [`UsageEvent`] | Record or missing-response warning |
//! | [`UsageSink`] | Trait for record destinations |
//! | [`TracingUsageSink`] | Structured `tracing` events (default) |
//! | [`ConsoleUsageSink`] | Human-readable lines on stdout |
//! | [`InMemoryUsageSink`] | In-memory sink for testing |
//! | [`CompositeUsageSink`] | Fan-out to several sinks |
//! | [`EventRecorder`] | Emits events, absorbing sink failures |

mod record;

pub use record::{CallTiming, RecordKind, UsageEvent, UsageRecord};

use std::io::Write;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// Tracing target for emitted usage records.
pub const USAGE_TARGET: &str = "llm_proxy_hooks::usage";

/// Append-only destination for usage events. Shared by all in-flight calls.
#[async_trait]
pub trait UsageSink: Send + Sync {
    fn name(&self) -> &str;

    async fn report(&self, event: &UsageEvent) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Which built-in sink the configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Console,
    #[default]
    Tracing,
    Noop,
}

impl SinkKind {
    pub fn build(self) -> Arc<dyn UsageSink> {
        match self {
            SinkKind::Console => Arc::new(ConsoleUsageSink::default()),
            SinkKind::Tracing => Arc::new(TracingUsageSink),
            SinkKind::Noop => Arc::new(NoopUsageSink),
        }
    }
}

/// Discards everything.
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    fn name(&self) -> &str {
        "noop"
    }

    async fn report(&self, _event: &UsageEvent) -> Result<()> {
        Ok(())
    }
}

/// Emits each record as a structured event on [`USAGE_TARGET`].
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn report(&self, event: &UsageEvent) -> Result<()> {
        match event {
            UsageEvent::Usage(r) => info!(
                target: USAGE_TARGET,
                kind = %r.kind,
                prompt = %r.preview,
                model = r.model.as_deref().unwrap_or(""),
                model_group = r.model_group.as_deref().unwrap_or(""),
                model_id = r.model_id.as_deref().unwrap_or(""),
                deployment = r.deployment.as_deref().unwrap_or(""),
                api_base = r.api_base.as_deref().unwrap_or(""),
                tokens = r.usage.total_tokens,
                input_tokens = r.usage.prompt_tokens,
                output_tokens = r.usage.completion_tokens,
                cost = ?r.cost,
                cost_error = r.cost_error.as_deref(),
                exception = r.exception.as_deref(),
                traceback = r.traceback.as_deref(),
                latency_ms = r.latency_ms,
                "usage"
            ),
            UsageEvent::MissingResponse { kind, model } => warn!(
                target: USAGE_TARGET,
                kind = %kind,
                model = model.as_deref().unwrap_or(""),
                "response missing, usage not recorded"
            ),
        }
        Ok(())
    }
}

/// Writes the rendered record to stdout, one blank line between records.
pub struct ConsoleUsageSink {
    prefix: String,
}

impl ConsoleUsageSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for ConsoleUsageSink {
    fn default() -> Self {
        Self::new("[usage]")
    }
}

#[async_trait]
impl UsageSink for ConsoleUsageSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn report(&self, event: &UsageEvent) -> Result<()> {
        let text = format!("\n{}\n{}\n", self.prefix, event.render());
        // Single write under the stdout lock keeps concurrent records from interleaving.
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(text.as_bytes())
            .and_then(|_| lock.flush())
            .map_err(|e| Error::sink(self.name(), e.to_string()))
    }
}

/// In-memory sink for testing.
pub struct InMemoryUsageSink {
    events: RwLock<Vec<UsageEvent>>,
    max_events: usize,
}

impl InMemoryUsageSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events: max,
        }
    }

    pub fn events(&self) -> Vec<UsageEvent> {
        self.events
            .read()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UsageEvent::Usage(r) => Some(r),
                UsageEvent::MissingResponse { .. } => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
}

impl Default for InMemoryUsageSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl UsageSink for InMemoryUsageSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn report(&self, event: &UsageEvent) -> Result<()> {
        let mut events = self
            .events
            .write()
            .map_err(|_| Error::sink(self.name(), "lock poisoned"))?;
        events.push(event.clone());
        if events.len() > self.max_events {
            events.remove(0);
        }
        Ok(())
    }
}

/// Reports to every inner sink concurrently. Fails if any inner sink failed,
/// after all of them have been tried.
pub struct CompositeUsageSink {
    sinks: Vec<Arc<dyn UsageSink>>,
}

impl CompositeUsageSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for CompositeUsageSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageSink for CompositeUsageSink {
    fn name(&self) -> &str {
        "composite"
    }

    async fn report(&self, event: &UsageEvent) -> Result<()> {
        let results = futures::future::join_all(self.sinks.iter().map(|s| s.report(event))).await;
        let failed: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::sink(self.name(), failed.join("; ")))
        }
    }

    async fn close(&self) -> Result<()> {
        for s in &self.sinks {
            let _ = s.close().await;
        }
        Ok(())
    }
}

/// Hands events to a sink, never failing.
#[derive(Clone)]
pub struct EventRecorder {
    sink: Arc<dyn UsageSink>,
}

impl EventRecorder {
    pub fn new(sink: Arc<dyn UsageSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn UsageSink> {
        &self.sink
    }

    pub async fn record(&self, event: UsageEvent) {
        if let Err(e) = self.sink.report(&event).await {
            warn!(sink = self.sink.name(), error = %e, "dropping usage event");
        }
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(Arc::new(TracingUsageSink))
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("sink", &self.sink.name())
            .finish()
    }
}
