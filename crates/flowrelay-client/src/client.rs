//! Flow engine REST client.
//!
//! Uses reqwest to start runs and to open the event stream a run offers.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{FlowClientError, FlowExecutionError};
use crate::stream::{self, StreamObserver, StreamSubscription, SubscriptionHandle};
use crate::types::{RunPhase, RunRequest, RunResponse};

/// Configuration for connecting to a flow engine.
#[derive(Debug, Clone)]
pub struct FlowClientConfig {
    /// Engine base URL (e.g., "<https://api.langflow.astra.datastax.com>").
    pub base_url: String,
    /// Application token sent as a bearer token.
    pub token: String,
    /// Upper bound for the initial run request. The event stream is unbounded.
    pub timeout: Option<Duration>,
}

/// Flow engine client. Cheap to clone; shares one connection pool.
#[derive(Debug, Clone)]
pub struct FlowClient {
    http: reqwest::Client,
    base_url: Url,
    auth: HeaderValue,
    timeout: Option<Duration>,
}

/// Result of a started run.
#[derive(Debug)]
pub struct FlowRun {
    pub response: RunResponse,
    /// Present when the run streams; the stream continues in the background.
    pub subscription: Option<SubscriptionHandle>,
}

impl FlowRun {
    pub fn phase(&self) -> RunPhase {
        self.subscription
            .as_ref()
            .map_or(RunPhase::Completed, SubscriptionHandle::phase)
    }
}

impl FlowClient {
    /// Create a new flow engine client.
    pub fn new(config: &FlowClientConfig) -> Result<Self, FlowClientError> {
        if config.base_url.is_empty() {
            return Err(FlowClientError::Config("base_url is empty".into()));
        }
        if config.token.is_empty() {
            return Err(FlowClientError::Config("token is empty".into()));
        }

        let mut base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(FlowClientError::Config(format!(
                "base_url {base_url} cannot be used as a base"
            )));
        }
        // Relative joins must land under the base path, not replace its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        base_url.set_query(None);
        base_url.set_fragment(None);

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| FlowClientError::Config("Invalid token format".into()))?;
        auth.set_sensitive(true);

        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url,
            auth,
            timeout: config.timeout,
        })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the run URL for a flow on an engine. Ids are percent-encoded as
    /// single path segments.
    pub(crate) fn run_url(
        &self,
        flow_id: &str,
        engine_id: &str,
        stream: bool,
    ) -> Result<Url, FlowClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                FlowClientError::Config(format!(
                    "base_url {} cannot be used as a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["lf", engine_id, "api", "v1", "run", flow_id]);
        url.query_pairs_mut()
            .append_pair("stream", if stream { "true" } else { "false" });
        Ok(url)
    }

    /// Resolve a stream URL, which the engine may hand out relative to itself.
    pub(crate) fn resolve_stream_url(&self, stream_url: &str) -> Result<Url, FlowClientError> {
        match Url::parse(stream_url) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(self.base_url.join(stream_url)?),
            Err(e) => Err(e.into()),
        }
    }

    /// Start a run. One attempt; errors surface immediately.
    pub async fn initiate_run(
        &self,
        flow_id: &str,
        engine_id: &str,
        request: &RunRequest,
    ) -> Result<RunResponse, FlowClientError> {
        let url = self.run_url(flow_id, engine_id, request.stream)?;
        debug!(%url, stream = request.stream, "Initiating flow run");

        let mut builder = self
            .http
            .post(url.clone())
            .header(AUTHORIZATION, self.auth.clone())
            .json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), %url, "Flow engine rejected run");
            return Err(FlowClientError::Request {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Subscribe to a run's event stream. Returns once the reader is spawned;
    /// connection failures arrive as the subscription's final event.
    ///
    /// The bearer token is only sent when the stream lives on the engine's origin.
    pub fn subscribe_stream(&self, stream_url: &str) -> Result<StreamSubscription, FlowClientError> {
        let url = self.resolve_stream_url(stream_url)?;
        let same_origin = url.origin() == self.base_url.origin();
        debug!(%url, same_origin, "Subscribing to run stream");

        let mut builder = self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if same_origin {
            builder = builder.header(AUTHORIZATION, self.auth.clone());
        }
        Ok(StreamSubscription::spawn(builder))
    }

    /// Start a run and, when it streams, hand its events to `observer` in the
    /// background. Returns as soon as the initial response is in.
    pub async fn run_flow(
        &self,
        flow_id: &str,
        engine_id: &str,
        request: &RunRequest,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<FlowRun, FlowExecutionError> {
        let response = self
            .initiate_run(flow_id, engine_id, request)
            .await
            .map_err(|e| {
                error!(flow_id, error = %e, "Error running flow");
                FlowExecutionError::new(flow_id, e)
            })?;
        info!(
            flow_id,
            session_id = response.session_id().unwrap_or("-"),
            "Flow run initiated"
        );

        let subscription = match response.stream_url().filter(|_| request.stream) {
            Some(stream_url) => {
                info!(flow_id, stream_url, "Streaming from engine");
                let subscription = self
                    .subscribe_stream(stream_url)
                    .map_err(|e| FlowExecutionError::new(flow_id, e))?;
                Some(stream::dispatch(subscription, observer))
            }
            None => None,
        };

        Ok(FlowRun {
            response,
            subscription,
        })
    }
}
