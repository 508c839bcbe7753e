//! Prompt rewriting plus usage/cost logging as one stateless hook set.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;

use super::{CallHooks, RequestContext};
use crate::config::HooksConfig;
use crate::cost::{CostCalculator, CostResolver, PricingTable};
use crate::rewrite::NoThinkRewriter;
use crate::telemetry::{CallTiming, EventRecorder, RecordKind, UsageEvent, UsageRecord, UsageSink};
use crate::types::{CallMetadata, CallRequest, CallType, Response};
use crate::usage;
use crate::Result;

/// Rewrites qwen-family system prompts before the call and records a usage
/// record after it.
///
/// ```rust
/// use std::sync::Arc;
/// use llm_proxy_hooks::hooks::UsageHooks;
/// use llm_proxy_hooks::telemetry::InMemoryUsageSink;
///
/// let sink = Arc::new(InMemoryUsageSink::default());
/// let hooks = UsageHooks::builder().sink(sink.clone()).build().unwrap();
/// # let _ = hooks;
/// ```
#[derive(Debug)]
pub struct UsageHooks {
    rewriter: NoThinkRewriter,
    resolver: CostResolver,
    recorder: EventRecorder,
    preview_words: usize,
}

impl UsageHooks {
    pub fn builder() -> UsageHooksBuilder {
        UsageHooksBuilder::new()
    }

    /// Hooks with the configured policy, the built-in pricing table extended
    /// by the configured entries, and the configured sink.
    pub fn from_config(config: HooksConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn rewriter(&self) -> &NoThinkRewriter {
        &self.rewriter
    }

    async fn log_event(
        &self,
        kind: RecordKind,
        meta: &CallMetadata,
        response: Option<&Response>,
        timing: CallTiming,
    ) {
        let response = match (kind, response) {
            (RecordKind::Success, None) => {
                self.recorder
                    .record(UsageEvent::MissingResponse {
                        kind,
                        model: meta.model.clone(),
                    })
                    .await;
                return;
            }
            (_, r) => r,
        };

        let extract = usage::extract(response, &meta.messages, self.preview_words);
        // A failure without a response has nothing to price.
        let cost = match response {
            Some(r) => Some(
                self.resolver
                    .resolve(meta.deployment().api_base.as_deref(), r)
                    .await,
            ),
            None => None,
        };
        let record = UsageRecord::from_parts(kind, meta, extract, cost.as_ref(), timing);
        self.recorder.record(UsageEvent::Usage(record)).await;
    }
}

#[async_trait]
impl CallHooks for UsageHooks {
    async fn pre_call(
        &self,
        ctx: &RequestContext,
        call_type: CallType,
        request: CallRequest,
    ) -> CallRequest {
        debug!(
            request_id = ctx.request_id.as_deref().unwrap_or(""),
            key_alias = ctx.key_alias.as_deref().unwrap_or(""),
            user_id = ctx.user_id.as_deref().unwrap_or(""),
            team_id = ctx.team_id.as_deref().unwrap_or(""),
            call_type = %call_type,
            model = %request.model(),
            "pre-call"
        );
        self.rewriter.rewrite_request(request)
    }

    async fn on_success(
        &self,
        meta: &CallMetadata,
        response: Option<&Response>,
        start: SystemTime,
        end: SystemTime,
    ) {
        self.log_event(RecordKind::Success, meta, response, CallTiming::new(start, end))
            .await;
    }

    async fn on_failure(
        &self,
        meta: &CallMetadata,
        response: Option<&Response>,
        start: SystemTime,
        end: SystemTime,
    ) {
        self.log_event(RecordKind::Failure, meta, response, CallTiming::new(start, end))
            .await;
    }
}

/// Builder for [`UsageHooks`]. Explicit calculator and sink override what the
/// configuration selects.
#[derive(Default)]
pub struct UsageHooksBuilder {
    config: HooksConfig,
    calculator: Option<Arc<dyn CostCalculator>>,
    sink: Option<Arc<dyn UsageSink>>,
}

impl UsageHooksBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: HooksConfig) -> Self {
        self.config = config;
        self
    }

    pub fn calculator(mut self, calculator: Arc<dyn CostCalculator>) -> Self {
        self.calculator = Some(calculator);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<UsageHooks> {
        self.config.validate()?;
        let HooksConfig {
            rewrite,
            cost,
            recorder,
        } = self.config;

        let calculator = self.calculator.unwrap_or_else(|| {
            let table = cost
                .pricing
                .iter()
                .cloned()
                .fold(PricingTable::builtin(), PricingTable::with);
            Arc::new(table)
        });
        let sink = self.sink.unwrap_or_else(|| recorder.sink.build());

        Ok(UsageHooks {
            rewriter: NoThinkRewriter::new(rewrite),
            resolver: CostResolver::new(calculator)
                .with_zero_cost_providers(cost.zero_cost_providers),
            recorder: EventRecorder::new(sink),
            preview_words: recorder.preview_words,
        })
    }
}
