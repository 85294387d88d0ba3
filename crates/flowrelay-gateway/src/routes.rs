//! HTTP routes: `POST /run-flow` and `GET /health`.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use flowrelay_client::{FlowClient, IoType, RunRequest, StreamObserver};
use flowrelay_core::RelayConfig;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::observer::TracingObserver;

/// Acknowledgment sent when the run streams.
pub const STREAM_IN_PROGRESS: &str = "Stream in progress";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub client: FlowClient,
    pub relay: Arc<RelayConfig>,
    pub observer: Arc<dyn StreamObserver>,
}

impl AppState {
    /// State with the logging-only stream observer.
    pub fn new(client: FlowClient, relay: RelayConfig) -> Self {
        Self {
            client,
            relay: Arc::new(relay),
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StreamObserver>) -> Self {
        self.observer = observer;
        self
    }
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/run-flow", post(run_flow))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Inbound `/run-flow` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFlowBody {
    pub input_value: String,
    #[serde(default)]
    pub input_type: IoType,
    #[serde(default)]
    pub output_type: IoType,
    #[serde(default)]
    pub stream: bool,
}

/// Successful `/run-flow` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunFlowReply {
    Output { success: bool, output: String },
    Started { success: bool, message: String },
}

impl RunFlowReply {
    pub const fn output(output: String) -> Self {
        Self::Output {
            success: true,
            output,
        }
    }

    pub fn started() -> Self {
        Self::Started {
            success: true,
            message: STREAM_IN_PROGRESS.to_string(),
        }
    }
}

/// `POST /run-flow` — run the configured flow with the caller's input.
pub async fn run_flow(
    State(state): State<AppState>,
    body: Result<Json<RunFlowBody>, JsonRejection>,
) -> Result<Json<RunFlowReply>, RelayError> {
    let Json(body) = body?;
    info!(
        input_type = ?body.input_type,
        output_type = ?body.output_type,
        stream = body.stream,
        input_len = body.input_value.len(),
        "Received run-flow request"
    );
    debug!(input_value = %body.input_value, "Run-flow input");

    let request = RunRequest {
        input_value: body.input_value,
        input_type: body.input_type,
        output_type: body.output_type,
        stream: body.stream,
        tweaks: state.relay.tweaks.clone(),
    };
    let run = state
        .client
        .run_flow(
            &state.relay.flow_id,
            &state.relay.engine_id,
            &request,
            Arc::clone(&state.observer),
        )
        .await?;

    if request.stream {
        return Ok(Json(RunFlowReply::started()));
    }
    let output = run.response.text()?.to_string();
    Ok(Json(RunFlowReply::output(output)))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
