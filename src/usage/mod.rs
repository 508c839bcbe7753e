//! Token counts and prompt preview for a finished call.

use crate::types::{Message, Response, TokenUsage};

/// Default number of words kept in the prompt preview.
pub const DEFAULT_PREVIEW_WORDS: usize = 10;

/// What the extractor pulls out of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageExtract {
    pub usage: TokenUsage,
    pub preview: String,
}

/// Extract token counts from `response` and a preview of the first user
/// message in `messages`. A missing response or usage block yields zeros.
pub fn extract(response: Option<&Response>, messages: &[Message], preview_words: usize) -> UsageExtract {
    UsageExtract {
        usage: response.and_then(|r| r.usage).unwrap_or_default(),
        preview: prompt_preview(messages, preview_words),
    }
}

/// First `words` whitespace-separated tokens of the first user message,
/// joined by single spaces. Empty when there is no user message.
pub fn prompt_preview(messages: &[Message], words: usize) -> String {
    messages
        .iter()
        .find(|m| m.is_user())
        .map(|m| m.text().split_whitespace().take(words).collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}
