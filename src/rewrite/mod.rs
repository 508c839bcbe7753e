//! System-prompt rewriting for model families that need a control marker.
//!
//! Hybrid reasoning models (Qwen3 and friends) think by default and switch
//! thinking off when the system prompt carries `/no_think`. The rewriter
//! appends that marker to the system message of every request bound for such
//! a model, unless the model name opts into thinking with a `think` suffix.
//!
//! The rewrite is pure: it takes the caller's messages by reference and
//! returns either the same slice or a freshly built sequence.

use std::borrow::Cow;

use serde_json::{json, Value};
use tracing::debug;

use crate::config::RewriteConfig;
use crate::types::{CallRequest, Message, MessageContent};

/// Applies the family marker policy described by a [`RewriteConfig`].
#[derive(Debug, Clone, Default)]
pub struct NoThinkRewriter {
    config: RewriteConfig,
}

impl NoThinkRewriter {
    pub fn new(config: RewriteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Whether requests for `model` get the marker.
    pub fn applies_to(&self, model: &str) -> bool {
        let c = &self.config;
        if !c.enabled || c.family.is_empty() || !model.contains(c.family.as_str()) {
            return false;
        }
        c.exempt_suffix.is_empty() || !model.ends_with(c.exempt_suffix.as_str())
    }

    /// Rewrite `messages` for `model`.
    ///
    /// When the policy applies, the first system message (or a new empty one)
    /// gets the marker appended and is moved to the front. Later system
    /// messages stay where they are. Content already ending in the marker is
    /// not marked twice.
    pub fn rewrite<'a>(&self, model: &str, messages: &'a [Message]) -> Cow<'a, [Message]> {
        if !self.applies_to(model) {
            return Cow::Borrowed(messages);
        }
        Cow::Owned(self.apply(messages.to_vec()))
    }

    /// Owned variant used by the pre-call hook.
    pub fn rewrite_request(&self, mut request: CallRequest) -> CallRequest {
        if self.applies_to(request.model()) {
            let messages = request.take_messages();
            request.set_messages(self.apply(messages));
        } else {
            debug!(model = %request.model(), "rewrite skipped");
        }
        request
    }

    fn apply(&self, mut messages: Vec<Message>) -> Vec<Message> {
        let mut system = match messages.iter().position(Message::is_system) {
            Some(idx) => messages.remove(idx),
            None => Message::system(""),
        };
        let marked = self.mark(system.content.take());
        system.set_content(marked);
        debug!(marker = %self.config.marker, "system prompt marked");
        messages.insert(0, system);
        messages
    }

    fn mark(&self, content: Option<MessageContent>) -> MessageContent {
        let marker = self.config.marker.as_str();
        let Some(content) = content else {
            return MessageContent::Text(marker.to_string());
        };
        match content {
            MessageContent::Text(text) => {
                let trimmed = text.trim();
                if trimmed.ends_with(marker) {
                    MessageContent::Text(trimmed.to_string())
                } else {
                    MessageContent::Text(format!("{} {}", trimmed, marker).trim().to_string())
                }
            }
            MessageContent::Blocks(mut blocks) => {
                let already = blocks
                    .iter()
                    .rev()
                    .find_map(|b| b.get("text").and_then(Value::as_str))
                    .map(|t| t.trim_end().ends_with(marker))
                    .unwrap_or(false);
                if !already {
                    blocks.push(json!({"type": "text", "text": marker}));
                }
                MessageContent::Blocks(blocks)
            }
        }
    }
}

/// Rewrite with the default policy (`qwen` family, `think` exemption,
/// `/no_think` marker).
pub fn rewrite<'a>(model: &str, messages: &'a [Message]) -> Cow<'a, [Message]> {
    NoThinkRewriter::default().rewrite(model, messages)
}
