//! Chat messages as carried in proxied request payloads.
//!
//! Messages round-trip losslessly: `role` and `content` are interpreted only
//! when they have the expected shape (a string role, string or block-array
//! content). Anything else, `null` included, stays verbatim in `extra`, and
//! keys that were absent stay absent.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// A single chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Option<MessageRole>,
    pub content: Option<MessageContent>,
    /// Every other key the host sent (tool calls, names, cache hints, or a
    /// `role`/`content` of an unexpected shape).
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            content: Some(MessageContent::Text(content.into())),
            extra: Map::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Parse one message object. Never fails for an object.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let role = match map.remove("role") {
            Some(Value::String(s)) => Some(MessageRole::from(s)),
            Some(other) => {
                map.insert("role".into(), other);
                None
            }
            None => None,
        };
        let content = match map.remove("content") {
            Some(Value::String(s)) => Some(MessageContent::Text(s)),
            Some(Value::Array(blocks)) => Some(MessageContent::Blocks(blocks)),
            Some(other) => {
                map.insert("content".into(), other);
                None
            }
            None => None,
        };
        Self {
            role,
            content,
            extra: map,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self.role, Some(MessageRole::System))
    }

    pub fn is_user(&self) -> bool {
        matches!(self.role, Some(MessageRole::User))
    }

    /// Role name, empty when the message has no string role.
    pub fn role_str(&self) -> &str {
        self.role.as_ref().map(MessageRole::as_str).unwrap_or("")
    }

    /// Plain-text view of the content; empty for absent or non-text content.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.content {
            Some(c) => c.text(),
            None => Cow::Borrowed(""),
        }
    }

    /// Replace the content, dropping any raw `content` value kept in `extra`.
    pub fn set_content(&mut self, content: MessageContent) {
        self.extra.remove("content");
        self.content = Some(content);
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(role) = &self.role {
            map.serialize_entry("role", role.as_str())?;
        }
        if let Some(content) = &self.content {
            map.serialize_entry("content", content)?;
        }
        for (k, v) in &self.extra {
            let shadowed = (k == "role" && self.role.is_some())
                || (k == "content" && self.content.is_some());
            if !shadowed {
                map.serialize_entry(k, v)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(de::Error::custom(format!(
                "message must be an object, got {}",
                other
            ))),
        }
    }
}

/// Message role. Roles the proxy forwards that we do not interpret
/// (`tool`, `developer`, ...) are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Other(String),
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Other(s) => s,
        }
    }
}

impl From<String> for MessageRole {
    fn from(s: String) -> Self {
        match s.as_str() {
            "system" => MessageRole::System,
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::Other(s),
        }
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message content: a plain string or an array of typed blocks
/// (`{"type": "text", "text": ...}`, image parts, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<Value>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Text blocks joined with a space; non-text blocks contribute nothing.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            MessageContent::Text(s) => Cow::Borrowed(s),
            MessageContent::Blocks(blocks) => Cow::Owned(
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(raw: Value) -> Value {
        let msg: Message = serde_json::from_value(raw).unwrap();
        serde_json::to_value(&msg).unwrap()
    }

    #[test]
    fn test_unknown_role_round_trips() {
        let msg: Message = serde_json::from_value(json!({"role": "tool", "content": "ok"})).unwrap();
        assert_eq!(msg.role, Some(MessageRole::Other("tool".into())));
        assert_eq!(serde_json::to_value(&msg).unwrap()["role"], "tool");
    }

    #[test]
    fn test_content_blocks_text_view() {
        let msg: Message = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "describe"},
                {"type": "image_url", "image_url": {"url": "data:..."}},
                {"type": "text", "text": "this"}
            ]
        }))
        .unwrap();
        assert_eq!(msg.text(), "describe this");
        assert!(matches!(msg.content, Some(MessageContent::Blocks(ref b)) if b.len() == 3));
    }

    #[test]
    fn test_null_content_kept_verbatim() {
        let raw = json!({"role": "assistant", "content": null, "tool_calls": [{"id": "t1"}]});
        let msg: Message = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(msg.content, None);
        assert_eq!(msg.text(), "");
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
    }

    #[test]
    fn test_missing_role_and_content_stay_absent() {
        assert_eq!(round_trip(json!({"content": "no role"})), json!({"content": "no role"}));
        assert_eq!(round_trip(json!({"role": "system"})), json!({"role": "system"}));
    }

    #[test]
    fn test_odd_shapes_kept_verbatim() {
        let raw = json!({"role": 7, "content": {"weird": true}, "name": "x"});
        let msg: Message = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(msg.role, None);
        assert_eq!(round_trip(raw.clone()), raw);
    }

    #[test]
    fn test_set_content_replaces_raw_value() {
        let mut msg: Message =
            serde_json::from_value(json!({"role": "system", "content": null})).unwrap();
        msg.set_content("/no_think".into());
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "system", "content": "/no_think"})
        );
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(serde_json::from_value::<Message>(json!("hello")).is_err());
    }
}
