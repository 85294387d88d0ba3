//! Relay configuration.
//!
//! Resolution order, lowest priority first:
//! 1. Built-in defaults (the component tweaks of the deployed flow)
//! 2. Tweaks file (JSON object, `--tweaks-file`)
//! 3. CLI arguments / environment variables for flow and engine ids

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-component overrides forwarded verbatim to the flow engine.
pub type Tweaks = BTreeMap<String, serde_json::Value>;

/// Component ids of the deployed RAG flow, each with an empty override.
const DEFAULT_COMPONENTS: &[&str] = &[
    "ChatInput-Zvqp4",
    "ParseData-bmuuF",
    "Prompt-nPeug",
    "SplitText-QgyJr",
    "OpenAIModel-H9u2C",
    "ChatOutput-HjX13",
    "AstraDB-kFYYv",
    "OpenAIEmbeddings-QvVOu",
    "AstraDB-LBn47",
    "OpenAIEmbeddings-2gAbb",
    "File-7y9jj",
];

/// Built-in tweaks map used when no tweaks file is configured.
pub fn default_tweaks() -> Tweaks {
    DEFAULT_COMPONENTS
        .iter()
        .map(|id| ((*id).to_string(), serde_json::json!({})))
        .collect()
}

/// Which flow the relay runs, and with which tweaks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// Flow id or name on the engine.
    pub flow_id: String,
    /// Engine (Langflow instance) id, the `/lf/{id}` path segment.
    pub engine_id: String,
    #[serde(default = "default_tweaks")]
    pub tweaks: Tweaks,
}

impl RelayConfig {
    /// Build a config with the default tweaks.
    pub fn new(flow_id: impl Into<String>, engine_id: impl Into<String>) -> Result<Self> {
        let config = Self {
            flow_id: flow_id.into(),
            engine_id: engine_id.into(),
            tweaks: default_tweaks(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replace the tweaks map.
    #[must_use]
    pub fn with_tweaks(mut self, tweaks: Tweaks) -> Self {
        self.tweaks = tweaks;
        self
    }

    /// Reject blank ids; they would produce a malformed engine path.
    pub fn validate(&self) -> Result<()> {
        if self.flow_id.trim().is_empty() {
            return Err(Error::Config("flow_id is empty".into()));
        }
        if self.engine_id.trim().is_empty() {
            return Err(Error::Config("engine_id is empty".into()));
        }
        if self.flow_id.contains('/') || self.engine_id.contains('/') {
            return Err(Error::Config(
                "flow_id and engine_id must not contain '/'".into(),
            ));
        }
        Ok(())
    }
}

/// Load a tweaks map from a JSON file. The top level must be an object.
pub fn load_tweaks(path: &Path) -> Result<Tweaks> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read tweaks file {}: {}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse tweaks file {}: {}", path.display(), e))
    })?;
    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(Error::Config(format!(
            "Tweaks file {} must contain a JSON object, found {}",
            path.display(),
            json_kind(&other)
        ))),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
