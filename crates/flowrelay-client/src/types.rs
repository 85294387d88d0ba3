//! Flow engine request/response types.

use flowrelay_core::Tweaks;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlowClientError;

/// Input or output type of a run. Unknown engine-defined values pass through.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoType {
    #[default]
    Chat,
    Text,
    Any,
    Debug,
    #[serde(untagged)]
    Other(String),
}

/// A run request. Serializes to the engine's JSON body; `stream` travels
/// in the query string instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub input_value: String,
    pub input_type: IoType,
    pub output_type: IoType,
    #[serde(skip)]
    pub stream: bool,
    pub tweaks: Tweaks,
}

impl RunRequest {
    /// Chat-in, chat-out request without streaming or tweaks.
    pub fn chat(input_value: impl Into<String>) -> Self {
        Self {
            input_value: input_value.into(),
            input_type: IoType::Chat,
            output_type: IoType::Chat,
            stream: false,
            tweaks: Tweaks::new(),
        }
    }

    #[must_use]
    pub fn with_types(mut self, input_type: IoType, output_type: IoType) -> Self {
        self.input_type = input_type;
        self.output_type = output_type;
        self
    }

    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    #[must_use]
    pub fn with_tweaks(mut self, tweaks: Tweaks) -> Self {
        self.tweaks = tweaks;
        self
    }
}

/// Dotted form of the terminal text location, used in error messages.
pub const TEXT_PATH: &str = "outputs[0].outputs[0].outputs.message.message.text";
/// Dotted form of the stream URL location.
pub const STREAM_URL_PATH: &str = "outputs[0].outputs[0].artifacts.stream_url";

const TEXT_POINTER: &str = "/outputs/0/outputs/0/outputs/message/message/text";
const STREAM_URL_POINTER: &str = "/outputs/0/outputs/0/artifacts/stream_url";

/// The engine's run response, kept as raw JSON and read through path accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunResponse(Value);

impl RunResponse {
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Terminal message text of the first output of the first component.
    pub fn text(&self) -> Result<&str, FlowClientError> {
        self.0
            .pointer(TEXT_POINTER)
            .and_then(Value::as_str)
            .ok_or(FlowClientError::ResponseShape { path: TEXT_PATH })
    }

    /// Stream URL offered by the engine, if any.
    pub fn stream_url(&self) -> Option<&str> {
        self.0
            .pointer(STREAM_URL_POINTER)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.0.get("session_id").and_then(Value::as_str)
    }

    pub const fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }
}

/// Lifecycle of a run once the initial request has succeeded.
///
/// A failed initial request never produces a phase; it surfaces as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Response received, no stream attached.
    Completed,
    /// Subscribed to the stream URL, events still arriving.
    Streaming,
    /// The engine sent a `close` event.
    Closed,
    /// The stream failed or dropped before `close`.
    StreamFailed,
    /// The subscription was cancelled locally.
    Cancelled,
}

impl RunPhase {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_request_body_omits_stream() {
        let request = RunRequest::chat("hello").with_stream(true);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "input_value": "hello",
                "input_type": "chat",
                "output_type": "chat",
                "tweaks": {}
            })
        );
    }

    #[test]
    fn io_type_passes_unknown_values_through() {
        let parsed: IoType = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(parsed, IoType::Text);

        let parsed: IoType = serde_json::from_str("\"structured\"").unwrap();
        assert_eq!(parsed, IoType::Other("structured".into()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"structured\"");
    }

    #[test]
    fn text_extracted_from_nested_path() {
        let response = RunResponse::new(json!({
            "outputs": [{"outputs": [{"outputs": {"message": {"message": {"text": "hi there"}}}}]}]
        }));
        assert_eq!(response.text().unwrap(), "hi there");
        assert_eq!(response.stream_url(), None);
    }

    #[test]
    fn missing_text_is_response_shape_error() {
        let response = RunResponse::new(json!({"outputs": [{"outputs": []}]}));
        let err = response.text().unwrap_err();
        assert!(matches!(err, FlowClientError::ResponseShape { path } if path == TEXT_PATH));
    }

    #[test]
    fn non_string_text_is_response_shape_error() {
        let response = RunResponse::new(json!({
            "outputs": [{"outputs": [{"outputs": {"message": {"message": {"text": 42}}}}]}]
        }));
        assert!(response.text().is_err());
    }

    #[test]
    fn stream_url_extracted() {
        let response = RunResponse::new(json!({
            "session_id": "s-1",
            "outputs": [{"outputs": [{"artifacts": {"stream_url": "/api/v1/stream/abc"}}]}]
        }));
        assert_eq!(response.stream_url(), Some("/api/v1/stream/abc"));
        assert_eq!(response.session_id(), Some("s-1"));
    }

    #[test]
    fn empty_stream_url_ignored() {
        let response = RunResponse::new(json!({
            "outputs": [{"outputs": [{"artifacts": {"stream_url": ""}}]}]
        }));
        assert_eq!(response.stream_url(), None);
    }

    #[test]
    fn only_streaming_is_non_terminal() {
        assert!(!RunPhase::Streaming.is_terminal());
        assert!(RunPhase::Completed.is_terminal());
        assert!(RunPhase::Closed.is_terminal());
        assert!(RunPhase::Cancelled.is_terminal());
    }
}
