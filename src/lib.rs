//! # llm-proxy-hooks
//!
//! 面向 LLM 代理的请求改写与用量/成本记录钩子。
//!
//! Request rewriting and usage accounting hooks for an LLM proxy.
//!
//! ## Overview
//!
//! The hosting proxy calls three entry points per proxied call:
//!
//! - **pre-call**: rewrites the outbound request according to a per-family
//!   policy (append `/no_think` to the system prompt of qwen models);
//! - **on-success / on-failure**: extracts token usage, prices the call and
//!   emits one usage record to a sink.
//!
//! Hooks are stateless and safe to call concurrently. Nothing that goes wrong
//! inside them (missing usage, unpriceable responses, unavailable sinks)
//! changes the outcome of the proxied call.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use llm_proxy_hooks::hooks::{CallHooks, RequestContext, UsageHooks};
//! use llm_proxy_hooks::telemetry::InMemoryUsageSink;
//! use llm_proxy_hooks::types::{CallRequest, CallType, Message};
//!
//! # #[tokio::main]
//! # async fn main() -> llm_proxy_hooks::Result<()> {
//! let sink = Arc::new(InMemoryUsageSink::default());
//! let hooks = UsageHooks::builder().sink(sink.clone()).build()?;
//!
//! let request = CallRequest::new("qwen-7b", vec![Message::user("hello")]);
//! let request = hooks
//!     .pre_call(&RequestContext::new(), CallType::ChatCompletion, request)
//!     .await;
//! assert_eq!(request.messages()[0].text(), "/no_think");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`rewrite`] | Family marker policy for system prompts |
//! | [`usage`] | Token counts and prompt preview |
//! | [`cost`] | Cost computation and zero-cost overrides |
//! | [`telemetry`] | Usage records and sinks |
//! | [`hooks`] | Lifecycle entry points and the hook chain |
//! | [`config`] | YAML configuration |
//! | [`types`] | Call-scoped data types |

pub mod config;
pub mod cost;
pub mod hooks;
pub mod rewrite;
pub mod telemetry;
pub mod types;
pub mod usage;
pub mod utils;

pub use config::HooksConfig;
pub use hooks::{CallHooks, HookChain, RequestContext, UsageHooks};
pub use types::{CallMetadata, CallRequest, CallResult, CallType, Message, MessageRole, Response};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
