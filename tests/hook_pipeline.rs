//! End-to-end tests for the proxy hook entry points.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use llm_proxy_hooks::cost::FnCostCalculator;
use llm_proxy_hooks::hooks::{CallHooks, HookChain, RequestContext, UsageHooks};
use llm_proxy_hooks::telemetry::{InMemoryUsageSink, RecordKind, UsageEvent};
use llm_proxy_hooks::types::{
    CallFailure, CallMetadata, CallRequest, CallResult, CallType, Message, MessageRole, Response,
};
use llm_proxy_hooks::{Error, HooksConfig};
use serde_json::json;

fn hooks(sink: Arc<InMemoryUsageSink>, calls: Arc<AtomicUsize>) -> UsageHooks {
    UsageHooks::builder()
        .calculator(Arc::new(FnCostCalculator::new(move |_: &Response| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(0.42)
        })))
        .sink(sink)
        .build()
        .expect("default config is valid")
}

fn metadata(api_base: &str) -> CallMetadata {
    CallMetadata::from_value(json!({
        "model": "qwen-7b",
        "messages": [
            {"role": "system", "content": "/no_think"},
            {"role": "user", "content": "Translate this paragraph into French please now"}
        ],
        "litellm_params": {
            "metadata": {
                "model_group": "qwen",
                "deployment": "ollama/qwen-7b",
                "model_info": {"id": "dep-1"},
                "api_base": api_base
            }
        }
    }))
}

#[tokio::test]
async fn test_pre_call_translation_scenario() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let hooks = hooks(sink, Arc::new(AtomicUsize::new(0)));
    let request = CallRequest::from_value(json!({
        "model": "qwen-7b",
        "messages": [{"role": "user", "content": "Translate this paragraph into French please now"}],
        "max_tokens": 64
    }));

    let out = hooks
        .pre_call(&RequestContext::new(), CallType::ChatCompletion, request)
        .await;

    assert_eq!(out.messages().len(), 2);
    assert_eq!(out.messages()[0].role, Some(MessageRole::System));
    assert_eq!(out.messages()[0].text(), "/no_think");
    assert_eq!(out.messages()[1].text(), "Translate this paragraph into French please now");
    assert_eq!(out.extra["max_tokens"], 64);
}

#[tokio::test]
async fn test_pre_call_passes_untriggered_bodies_through_unchanged() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let hooks = hooks(sink, Arc::new(AtomicUsize::new(0)));
    let bodies = [
        json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "user", "content": "weather in Paris?"},
                {"role": "assistant", "content": null, "tool_calls": [{"id": "call_1", "type": "function"}]},
                {"role": "tool", "tool_call_id": "call_1", "content": "sunny"},
                {"content": "a message without a role"}
            ],
            "tools": [{"type": "function", "function": {"name": "weather"}}]
        }),
        json!({"input": ["embed me"], "encoding_format": "float"}),
        json!({"model": "text-embedding-3-small", "input": "embed me"}),
    ];

    for body in bodies {
        let out = hooks
            .pre_call(
                &RequestContext::new(),
                CallType::Embeddings,
                CallRequest::from_value(body.clone()),
            )
            .await;
        assert_eq!(out.into_value().unwrap(), body);
    }
}

#[tokio::test]
async fn test_pre_call_think_model_untouched() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let hooks = hooks(sink, Arc::new(AtomicUsize::new(0)));
    let request = CallRequest::new(
        "qwen-7b-think",
        vec![Message::user("q"), Message::system("s")],
    );
    let out = hooks
        .pre_call(&RequestContext::new(), CallType::Completion, request.clone())
        .await;
    assert_eq!(out, request);
}

#[tokio::test]
async fn test_success_record_fields() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let hooks = hooks(sink.clone(), calls.clone());
    let resp = Response::from_value(json!({
        "model": "qwen-7b",
        "usage": {"prompt_tokens": 11, "completion_tokens": 7, "total_tokens": 18}
    }));
    let now = SystemTime::now();

    hooks
        .on_success(&metadata("http://localhost:11434"), Some(&resp), now, now)
        .await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.kind, RecordKind::Success);
    assert_eq!(r.preview, "Translate this paragraph into French please now");
    assert_eq!(r.model.as_deref(), Some("qwen-7b"));
    assert_eq!(r.model_group.as_deref(), Some("qwen"));
    assert_eq!(r.model_id.as_deref(), Some("dep-1"));
    assert_eq!(r.deployment.as_deref(), Some("ollama/qwen-7b"));
    assert_eq!(r.api_base.as_deref(), Some("http://localhost:11434"));
    assert_eq!(
        (r.usage.prompt_tokens, r.usage.completion_tokens, r.usage.total_tokens),
        (11, 7, 18)
    );
    assert_eq!(r.cost, Some(0.42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_copilot_base_is_free() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let hooks = hooks(sink.clone(), calls.clone());
    let resp = Response::from_value(json!({"usage": {"total_tokens": 1000}}));
    let now = SystemTime::now();

    hooks
        .on_success(&metadata("https://api.githubcopilot.com"), Some(&resp), now, now)
        .await;

    assert_eq!(sink.records()[0].cost, Some(0.0));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_success_without_response_emits_one_warning() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let hooks = hooks(sink.clone(), Arc::new(AtomicUsize::new(0)));
    let now = SystemTime::now();

    hooks.on_success(&metadata("x"), None, now, now).await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_warning());
    assert_eq!(
        events[0],
        UsageEvent::MissingResponse {
            kind: RecordKind::Success,
            model: Some("qwen-7b".into()),
        }
    );
}

#[tokio::test]
async fn test_failure_timeout_scenario() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let hooks = hooks(sink.clone(), calls.clone());
    let meta = CallMetadata::from_value(json!({
        "model": "qwen-7b",
        "messages": [{"role": "user", "content": "hi"}],
        "exception": "TimeoutError",
        "traceback_exception": "Traceback (most recent call last): ..."
    }));
    let now = SystemTime::now();

    hooks.on_failure(&meta, None, now, now).await;

    let r = &sink.records()[0];
    assert_eq!(r.kind, RecordKind::Failure);
    assert_eq!(r.exception.as_deref(), Some("TimeoutError"));
    assert!(r.traceback.as_deref().unwrap().starts_with("Traceback"));
    assert_eq!(r.usage.total_tokens, 0);
    assert_eq!(r.cost, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unpriceable_response_still_recorded() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let hooks = UsageHooks::builder()
        .calculator(Arc::new(FnCostCalculator::new(|r: &Response| {
            Err(Error::cost(r.model(), "unsupported response"))
        })))
        .sink(sink.clone())
        .build()
        .unwrap();
    let resp = Response::from_value(json!({"model": "mystery"}));
    let now = SystemTime::now();

    hooks.on_success(&metadata("http://x"), Some(&resp), now, now).await;

    let r = &sink.records()[0];
    assert_eq!(r.cost, None);
    assert!(r.cost_error.as_deref().unwrap().contains("unsupported response"));
}

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let sink = Arc::new(InMemoryUsageSink::new(1000));
    let hooks = Arc::new(hooks(sink.clone(), Arc::new(AtomicUsize::new(0))));

    let mut handles = Vec::new();
    for i in 0..50u64 {
        let hooks = hooks.clone();
        handles.push(tokio::spawn(async move {
            let model = if i % 2 == 0 { "qwen-7b" } else { "gpt-4o" };
            let req = CallRequest::new(model, vec![Message::user(format!("question {i}"))]);
            let req = hooks
                .pre_call(&RequestContext::new(), CallType::ChatCompletion, req)
                .await;
            let meta = CallMetadata::for_request(&req);
            let resp = Response::from_value(json!({"usage": {"total_tokens": i}}));
            let now = SystemTime::now();
            hooks.on_success(&meta, Some(&resp), now, now).await;
            (i, req.messages().len())
        }));
    }
    for h in handles {
        let (i, len) = h.await.unwrap();
        assert_eq!(len, if i % 2 == 0 { 2 } else { 1 });
    }

    let mut records = sink.records();
    assert_eq!(records.len(), 50);
    records.sort_by_key(|r| r.usage.total_tokens);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.preview, format!("question {i}"));
    }
}

#[tokio::test]
async fn test_chain_returns_backend_result_unchanged() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let chain = HookChain::new().with(hooks(sink.clone(), Arc::new(AtomicUsize::new(0))));
    let request = CallRequest::new("qwen3:8b", vec![Message::user("ping")]);

    let result = chain
        .execute(
            &RequestContext::new().with_request_id("req-1"),
            CallType::ChatCompletion,
            request,
            |req| async move {
                // backend sees the rewritten request
                assert_eq!(req.messages()[0].text(), "/no_think");
                CallResult::Response(Response::from_value(json!({
                    "choices": [{"message": {"content": "pong"}}],
                    "usage": {"prompt_tokens": 2, "completion_tokens": 1, "total_tokens": 3}
                })))
            },
        )
        .await;

    let resp = result.response().unwrap();
    assert_eq!(resp.payload["choices"][0]["message"]["content"], "pong");
    let r = &sink.records()[0];
    assert_eq!(r.preview, "ping");
    assert_eq!(r.model.as_deref(), Some("qwen3:8b"));
    assert_eq!(r.usage.total_tokens, 3);
}

#[tokio::test]
async fn test_chain_failure_surfaces_exception() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let chain = HookChain::new().with(hooks(sink.clone(), Arc::new(AtomicUsize::new(0))));
    let mut request = CallRequest::new("gpt-4o", vec![Message::user("hello")]);
    request.extra.insert(
        "litellm_params".into(),
        json!({"metadata": {"api_base": "https://api.openai.com"}}),
    );

    let result = chain
        .execute(&RequestContext::new(), CallType::ChatCompletion, request, |_| async {
            CallResult::Failure {
                failure: CallFailure::new("RateLimitError").with_traceback("429"),
                response: None,
            }
        })
        .await;

    assert!(!result.is_success());
    let r = &sink.records()[0];
    assert_eq!(r.kind, RecordKind::Failure);
    assert_eq!(r.exception.as_deref(), Some("RateLimitError"));
    assert_eq!(r.traceback.as_deref(), Some("429"));
    assert_eq!(r.api_base.as_deref(), Some("https://api.openai.com"));
}

#[tokio::test]
async fn test_pre_call_chain_is_sequential() {
    let sink = Arc::new(InMemoryUsageSink::default());
    let a = hooks(sink.clone(), Arc::new(AtomicUsize::new(0)));
    let b = hooks(sink, Arc::new(AtomicUsize::new(0)));
    let chain = HookChain::new().with(a).with(b);
    let out = chain
        .pre_call(
            &RequestContext::new(),
            CallType::ChatCompletion,
            CallRequest::new("qwen-7b", vec![Message::system("Be terse.")]),
        )
        .await;
    // second rewrite must not add a second marker
    assert_eq!(out.messages()[0].text(), "Be terse. /no_think");
}

#[test]
fn test_config_driven_hooks() {
    let config = HooksConfig::from_yaml_str(
        "rewrite:\n  family: deepseek\n  marker: /nothink\nrecorder:\n  sink: noop\n",
    )
    .unwrap();
    let hooks = UsageHooks::from_config(config).unwrap();
    assert!(hooks.rewriter().applies_to("deepseek-v3"));
    assert!(!hooks.rewriter().applies_to("qwen-7b"));
}
