//! Stream observer that only logs.
//!
//! Stream content is not forwarded to the HTTP caller; it is visible in the
//! gateway's logs.

use flowrelay_client::{StreamError, StreamObserver};
use serde_json::Value;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StreamObserver for TracingObserver {
    fn on_update(&self, payload: &Value) {
        match payload.get("chunk") {
            Some(chunk) => info!(%chunk, "Streaming update"),
            None => debug!(%payload, "Streaming update without chunk"),
        }
    }

    fn on_close(&self, reason: &str) {
        info!(reason, "Stream closed");
    }

    fn on_error(&self, error: &StreamError) {
        error!(%error, "Stream error");
    }
}
