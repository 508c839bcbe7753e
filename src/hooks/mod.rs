//! Call lifecycle hooks invoked by the hosting proxy.
//!
//! A hook set exposes three entry points: a pre-call hook that may rewrite
//! the outbound request, and success/failure post-call hooks. Implementations
//! hold no per-call state, so one instance serves every in-flight call.

mod chain;
mod usage_hooks;

pub use chain::HookChain;
pub use usage_hooks::{UsageHooks, UsageHooksBuilder};

use std::time::SystemTime;

use async_trait::async_trait;

use crate::types::{CallMetadata, CallRequest, CallType, Response};

/// Caller identity the proxy attaches to the pre-call hook. Only logged;
/// nothing here influences the rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub key_alias: Option<String>,
    pub user_id: Option<String>,
    pub team_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_key_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = Some(alias.into());
        self
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn with_team_id(mut self, id: impl Into<String>) -> Self {
        self.team_id = Some(id.into());
        self
    }
}

/// The three proxy lifecycle entry points. None of them can fail: whatever
/// goes wrong inside a hook is degraded or logged, never surfaced.
#[async_trait]
pub trait CallHooks: Send + Sync {
    /// Returns the request to forward, possibly rewritten.
    async fn pre_call(
        &self,
        _ctx: &RequestContext,
        _call_type: CallType,
        request: CallRequest,
    ) -> CallRequest {
        request
    }

    async fn on_success(
        &self,
        _meta: &CallMetadata,
        _response: Option<&Response>,
        _start: SystemTime,
        _end: SystemTime,
    ) {
    }

    /// `response` is usually absent for failures.
    async fn on_failure(
        &self,
        _meta: &CallMetadata,
        _response: Option<&Response>,
        _start: SystemTime,
        _end: SystemTime,
    ) {
    }
}
