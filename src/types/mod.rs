//! 类型模块：与宿主代理交换的调用级数据类型。
//!
//! # Types Module
//!
//! Call-scoped data exchanged with the hosting proxy.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and content |
//! | [`CallRequest`] | Outbound request data seen by the pre-call hook |
//! | [`CallMetadata`] | Call metadata seen by the post-call hooks |
//! | [`Response`] | Backend response with optional token usage |
//! | [`CallResult`] | Tagged success/failure outcome of a call |
//!
//! ## Example
//!
//! ```rust
//! use llm_proxy_hooks::types::{CallRequest, Message};
//!
//! let request = CallRequest::new("qwen-7b", vec![Message::user("hello")]);
//! assert_eq!(request.messages().len(), 1);
//! ```

pub mod call;
pub mod message;

pub use call::{
    CallFailure, CallMetadata, CallRequest, CallResult, CallType, DeploymentMetadata,
    LitellmParams, ModelInfo, Response, TokenUsage,
};
pub use message::{Message, MessageContent, MessageRole};
