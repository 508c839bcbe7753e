use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use super::{CallHooks, RequestContext};
use crate::types::{CallMetadata, CallRequest, CallResult, CallType};

/// Runs hook sets in registration order around a backend call.
///
/// Pre-call hooks are chained (each sees the previous one's output); the
/// post-call hooks all see the same metadata and response. The backend's
/// result is returned unchanged.
#[derive(Default, Clone)]
pub struct HookChain {
    hooks: Vec<Arc<dyn CallHooks>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn with<H: CallHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks.push(Arc::new(hooks));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn pre_call(
        &self,
        ctx: &RequestContext,
        call_type: CallType,
        mut request: CallRequest,
    ) -> CallRequest {
        for h in &self.hooks {
            request = h.pre_call(ctx, call_type, request).await;
        }
        request
    }

    /// Dispatch a finished call to the success or failure hooks.
    pub async fn post_call(
        &self,
        meta: &CallMetadata,
        result: &CallResult,
        start: SystemTime,
        end: SystemTime,
    ) {
        match result {
            CallResult::Response(resp) => {
                for h in &self.hooks {
                    h.on_success(meta, Some(resp), start, end).await;
                }
            }
            CallResult::Failure { failure, response } => {
                let meta = meta.clone().with_failure(failure);
                for h in &self.hooks {
                    h.on_failure(&meta, response.as_ref(), start, end).await;
                }
            }
        }
    }

    /// Rewrite `request`, hand it to `f`, then run the post-call hooks.
    pub async fn execute<F, Fut>(
        &self,
        ctx: &RequestContext,
        call_type: CallType,
        request: CallRequest,
        f: F,
    ) -> CallResult
    where
        F: FnOnce(CallRequest) -> Fut,
        Fut: Future<Output = CallResult>,
    {
        let request = self.pre_call(ctx, call_type, request).await;
        let meta = CallMetadata::for_request(&request);

        let start = SystemTime::now();
        let result = f(request).await;
        let end = SystemTime::now();

        self.post_call(&meta, &result, start, end).await;
        result
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
