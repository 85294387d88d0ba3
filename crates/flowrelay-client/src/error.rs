//! Error types for the flow engine client.

use thiserror::Error;

/// Errors from a single call against the flow engine.
#[derive(Debug, Error)]
pub enum FlowClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Flow engine error ({status}): {body}")]
    Request { status: u16, body: String },

    #[error("Response is missing expected field `{path}`")]
    ResponseShape { path: &'static str },

    #[error("Response body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowClientError {
    /// Upstream HTTP status, if the engine answered at all.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A run that could not be started.
///
/// Keeps the generic "error initiating session" wording of the relay's
/// responses, with the underlying [`FlowClientError`] available through
/// [`kind`](Self::kind) and `source()`.
#[derive(Debug, Error)]
#[error("Error initiating session for flow {flow_id}: {source}")]
pub struct FlowExecutionError {
    pub flow_id: String,
    #[source]
    pub source: FlowClientError,
}

impl FlowExecutionError {
    pub fn new(flow_id: impl Into<String>, source: FlowClientError) -> Self {
        Self {
            flow_id: flow_id.into(),
            source,
        }
    }

    pub const fn kind(&self) -> &FlowClientError {
        &self.source
    }
}

/// Failures observed on an event subscription.
///
/// These never reach the caller that started the run; they are delivered
/// as the final event of the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Stream transport error: {0}")]
    Transport(String),

    #[error("Stream endpoint returned status {0}")]
    Status(u16),

    #[error("Stream event is not valid JSON: {message}")]
    Decode { data: String, message: String },

    #[error("Stream ended without a close event")]
    Disconnected,
}
