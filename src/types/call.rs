//! Call-scoped values exchanged with the hosting proxy.
//!
//! All of these are plain owned values: one instance per proxied call, never
//! shared between calls. Everything the host supplies is parsed leniently
//! (see [`crate::utils::lenient`]), so absent or malformed fields read as
//! defaults rather than errors.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::Message;
use crate::utils::lenient;

/// Call-type tag the proxy attaches to every pre-call invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    #[serde(rename = "acompletion")]
    ChatCompletion,
    Completion,
    TextCompletion,
    Embeddings,
    ImageGeneration,
    Moderation,
    AudioTranscription,
    #[serde(rename = "pass_through_endpoint")]
    PassThrough,
    Rerank,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::ChatCompletion => "acompletion",
            CallType::Completion => "completion",
            CallType::TextCompletion => "text_completion",
            CallType::Embeddings => "embeddings",
            CallType::ImageGeneration => "image_generation",
            CallType::Moderation => "moderation",
            CallType::AudioTranscription => "audio_transcription",
            CallType::PassThrough => "pass_through_endpoint",
            CallType::Rerank => "rerank",
        }
    }
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request data as handed to the pre-call hook.
///
/// `model` and `messages` are the only interpreted keys, and only when they
/// have the expected shape (a string, an array of objects). Everything else,
/// odd shapes included, is preserved in `extra`; absent keys stay absent, so
/// an untouched request serializes back exactly as it came in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRequest {
    model: Option<String>,
    messages: Option<Vec<Message>>,
    pub extra: Map<String, Value>,
}

impl CallRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: Some(model.into()),
            messages: Some(messages),
            extra: Map::new(),
        }
    }

    /// Parse host request data. Never fails: a non-object payload yields an
    /// empty request.
    pub fn from_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                tracing::debug!("request data not an object, using defaults: {}", other);
                return Self::default();
            }
        };
        let model = match map.remove("model") {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                map.insert("model".into(), other);
                None
            }
            None => None,
        };
        let messages = match map.remove("messages") {
            Some(Value::Array(items)) if items.iter().all(Value::is_object) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(m) => Some(Message::from_map(m)),
                        _ => None,
                    })
                    .collect(),
            ),
            Some(other) => {
                map.insert("messages".into(), other);
                None
            }
            None => None,
        };
        Self {
            model,
            messages,
            extra: map,
        }
    }

    pub fn into_value(self) -> crate::Result<Value> {
        Ok(serde_json::to_value(&self)?)
    }

    /// Model name, empty when absent or not a string.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("")
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.as_deref().unwrap_or(&[])
    }

    /// Move the messages out, leaving the request without a parsed
    /// message list. Any raw `messages` value stays in `extra`.
    pub fn take_messages(&mut self) -> Vec<Message> {
        self.messages.take().unwrap_or_default()
    }

    /// Install a message list, replacing any raw `messages` value.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.extra.remove("messages");
        self.messages = Some(messages);
    }
}

impl Serialize for CallRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(model) = &self.model {
            map.serialize_entry("model", model)?;
        }
        if let Some(messages) = &self.messages {
            map.serialize_entry("messages", messages)?;
        }
        for (k, v) in &self.extra {
            let shadowed = (k == "model" && self.model.is_some())
                || (k == "messages" && self.messages.is_some());
            if !shadowed {
                map.serialize_entry(k, v)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CallRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

/// Token counts reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    /// Read a `usage` object. Missing counters are zero.
    pub fn from_value(usage: &Value) -> Self {
        Self {
            prompt_tokens: lenient::counter(usage.get("prompt_tokens")),
            completion_tokens: lenient::counter(usage.get("completion_tokens")),
            total_tokens: lenient::counter(usage.get("total_tokens")),
        }
    }
}

/// A backend response: optional usage plus the raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub usage: Option<TokenUsage>,
    pub payload: Value,
}

impl Response {
    pub fn from_value(payload: Value) -> Self {
        let usage = payload
            .get("usage")
            .filter(|u| u.is_object())
            .map(TokenUsage::from_value);
        Self { usage, payload }
    }

    /// Model name the backend reports, if any.
    pub fn model(&self) -> Option<&str> {
        self.payload.get("model").and_then(Value::as_str)
    }
}

/// Backend failure description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFailure {
    pub exception: Option<String>,
    pub traceback: Option<String>,
}

impl CallFailure {
    pub fn new(exception: impl Into<String>) -> Self {
        Self {
            exception: Some(exception.into()),
            traceback: None,
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }
}

/// Outcome of a proxied call: exactly one of a response or a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Response(Response),
    Failure {
        failure: CallFailure,
        /// Partial response some backends return alongside an error.
        response: Option<Response>,
    },
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Response(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            CallResult::Response(r) => Some(r),
            CallResult::Failure { response, .. } => response.as_ref(),
        }
    }
}

/// Call metadata the proxy passes to the post-call hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub messages: Vec<Message>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub litellm_params: LitellmParams,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub exception: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub traceback_exception: Option<String>,
}

impl CallMetadata {
    /// Parse host call metadata. Never fails.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!("call metadata not an object, using defaults: {}", e);
            Self::default()
        })
    }

    /// Build metadata for a request that is about to be forwarded. Routing
    /// details are taken from the request's `litellm_params` entry when the
    /// host placed one there.
    pub fn for_request(request: &CallRequest) -> Self {
        let litellm_params = request
            .extra
            .get("litellm_params")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Self {
            model: Some(request.model().to_string()).filter(|m| !m.is_empty()),
            messages: request.messages().to_vec(),
            litellm_params,
            exception: None,
            traceback_exception: None,
        }
    }

    pub fn with_failure(mut self, failure: &CallFailure) -> Self {
        if failure.exception.is_some() {
            self.exception = failure.exception.clone();
        }
        if failure.traceback.is_some() {
            self.traceback_exception = failure.traceback.clone();
        }
        self
    }

    pub fn deployment(&self) -> &DeploymentMetadata {
        &self.litellm_params.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LitellmParams {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub metadata: DeploymentMetadata,
}

/// Routing metadata: which model pool and which backend instance served the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentMetadata {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub model_group: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub deployment: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub model_info: ModelInfo,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
}
