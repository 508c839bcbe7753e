//! Hook configuration.
//!
//! Loaded from YAML; every field has a default so an empty document (or no
//! file at all) yields the stock policy.
//!
//! ```yaml
//! rewrite:
//!   family: qwen
//!   exempt_suffix: think
//!   marker: /no_think
//! cost:
//!   zero_cost_providers: [githubcopilot]
//!   pricing:
//!     - { model: local-llm, input_cost_per_1k: 0.0, output_cost_per_1k: 0.0 }
//! recorder:
//!   preview_words: 10
//!   sink: console
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cost::ModelPricing;
use crate::telemetry::SinkKind;
use crate::usage::DEFAULT_PREVIEW_WORDS;
use crate::{Error, ErrorContext, Result};

/// Environment variable naming the YAML configuration file.
pub const CONFIG_ENV: &str = "LLM_PROXY_HOOKS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub rewrite: RewriteConfig,
    pub cost: CostConfig,
    pub recorder: RecorderConfig,
}

/// Family marker policy for the pre-call rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub enabled: bool,
    /// Substring that selects the model family (case-sensitive).
    pub family: String,
    /// Models ending with this suffix are left alone. Empty disables the exemption.
    pub exempt_suffix: String,
    /// Token appended to the system prompt.
    pub marker: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            family: "qwen".into(),
            exempt_suffix: "think".into(),
            marker: "/no_think".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// `api_base` substrings of providers billed at zero.
    pub zero_cost_providers: Vec<String>,
    /// Extra pricing entries layered over the built-in table.
    pub pricing: Vec<ModelPricing>,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            zero_cost_providers: vec!["githubcopilot".into()],
            pricing: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub preview_words: usize,
    pub sink: SinkKind,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            preview_words: DEFAULT_PREVIEW_WORDS,
            sink: SinkKind::default(),
        }
    }
}

impl HooksConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: HooksConfig = if yaml.trim().is_empty() {
            HooksConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read {}", path.display()),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load from the file named by [`CONFIG_ENV`], or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, msg: &str| {
            Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path(field)
                    .with_source("config_validator"),
            )
        };
        if self.rewrite.enabled && self.rewrite.family.is_empty() {
            return Err(invalid("rewrite.family", "must not be empty"));
        }
        if self.rewrite.enabled && self.rewrite.marker.trim().is_empty() {
            return Err(invalid("rewrite.marker", "must not be empty"));
        }
        for (i, p) in self.cost.pricing.iter().enumerate() {
            if p.model.is_empty() {
                return Err(invalid(&format!("cost.pricing[{}].model", i), "must not be empty"));
            }
            if !(p.input_cost_per_1k >= 0.0 && p.output_cost_per_1k >= 0.0) {
                return Err(invalid(
                    &format!("cost.pricing[{}]", i),
                    "costs must be non-negative numbers",
                ));
            }
        }
        if self.recorder.preview_words == 0 {
            return Err(invalid("recorder.preview_words", "must be at least 1"));
        }
        Ok(())
    }
}
