//! Server-Sent Events subscription to a run's stream URL.
//!
//! A [`StreamSubscription`] is a `Stream` of [`StreamEvent`]s fed by a
//! background reader task. The sequence ends after the first terminal
//! event (`Closed` or `Failed`) or when the subscription is cancelled.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::types::RunPhase;

const EVENT_BUFFER: usize = 64;
const CLOSE_EVENT: &str = "close";
const DEFAULT_CLOSE_REASON: &str = "Stream closed";

/// One item of a run's event sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A `message` event, payload parsed as JSON.
    Update(Value),
    /// The engine sent `close`.
    Closed(String),
    /// The subscription failed.
    Failed(StreamError),
}

impl StreamEvent {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Update(_))
    }
}

/// Callbacks for a subscription drained in the background by [`dispatch`].
pub trait StreamObserver: Send + Sync {
    fn on_update(&self, payload: &Value);
    fn on_close(&self, reason: &str);
    fn on_error(&self, error: &StreamError);
}

/// Cancellation and status handle for a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    abort: AbortHandle,
    phase: Arc<watch::Sender<RunPhase>>,
}

impl SubscriptionHandle {
    /// Close the underlying connection. Events already buffered are still
    /// delivered, then the sequence ends.
    pub fn cancel(&self) {
        self.abort.abort();
        settle(&self.phase, RunPhase::Cancelled);
    }

    /// Whether the reader task has stopped.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }
}

/// Live event subscription.
#[derive(Debug)]
pub struct StreamSubscription {
    receiver: mpsc::Receiver<StreamEvent>,
    handle: SubscriptionHandle,
}

impl StreamSubscription {
    /// Start reading events from `request` on a background task.
    pub(crate) fn spawn(request: reqwest::RequestBuilder) -> Self {
        let (tx, receiver) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(read_events(request, tx));
        let (phase, _) = watch::channel(RunPhase::Streaming);
        Self {
            receiver,
            handle: SubscriptionHandle {
                abort: task.abort_handle(),
                phase: Arc::new(phase),
            },
        }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }
}

impl Stream for StreamSubscription {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.receiver.poll_recv(cx);
        match &polled {
            Poll::Ready(Some(StreamEvent::Closed(_))) => {
                settle(&self.handle.phase, RunPhase::Closed);
            }
            Poll::Ready(Some(StreamEvent::Failed(_))) => {
                settle(&self.handle.phase, RunPhase::StreamFailed);
            }
            _ => {}
        }
        polled
    }
}

/// Drain `subscription` into `observer` on a detached task.
pub fn dispatch(
    subscription: StreamSubscription,
    observer: Arc<dyn StreamObserver>,
) -> SubscriptionHandle {
    let handle = subscription.handle();
    tokio::spawn(observe(subscription, observer));
    handle
}

/// Feed every event of `subscription` to `observer` until it ends.
pub async fn observe(mut subscription: StreamSubscription, observer: Arc<dyn StreamObserver>) {
    while let Some(event) = subscription.next().await {
        match event {
            StreamEvent::Update(payload) => observer.on_update(&payload),
            StreamEvent::Closed(reason) => observer.on_close(&reason),
            StreamEvent::Failed(error) => observer.on_error(&error),
        }
    }
}

/// Move out of `Streaming` once; later transitions are ignored.
fn settle(phase: &watch::Sender<RunPhase>, next: RunPhase) {
    phase.send_modify(|current| {
        if !current.is_terminal() {
            *current = next;
        }
    });
}

async fn read_events(request: reqwest::RequestBuilder, tx: mpsc::Sender<StreamEvent>) {
    let terminal = match request.send().await {
        Err(e) => {
            warn!(error = %e, "Stream connection failed");
            StreamEvent::Failed(StreamError::Transport(e.to_string()))
        }
        Ok(response) if !response.status().is_success() => {
            let status = response.status().as_u16();
            warn!(status, "Stream endpoint rejected subscription");
            StreamEvent::Failed(StreamError::Status(status))
        }
        Ok(response) => match pump(response, &tx).await {
            Some(event) => event,
            None => return,
        },
    };
    // The subscriber may have been dropped already; nothing left to tell.
    let _ = tx.send(terminal).await;
}

/// Forward updates until a terminal event. `None` means the subscriber is gone.
async fn pump(response: reqwest::Response, tx: &mpsc::Sender<StreamEvent>) -> Option<StreamEvent> {
    let mut events = std::pin::pin!(response.bytes_stream().eventsource());
    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Stream read error");
                return Some(StreamEvent::Failed(StreamError::Transport(e.to_string())));
            }
        };
        let Some(decoded) = decode_event(&event.event, &event.data) else {
            debug!(event_type = %event.event, "Skipping unhandled stream event");
            continue;
        };
        if decoded.is_terminal() {
            return Some(decoded);
        }
        if tx.send(decoded).await.is_err() {
            debug!("Stream subscriber dropped");
            return None;
        }
    }
    Some(StreamEvent::Failed(StreamError::Disconnected))
}

/// Map one SSE event to a [`StreamEvent`]. Named events other than `close`
/// are not part of the run's sequence and yield `None`.
///
/// A payload that is not JSON becomes a terminal `Failed(Decode)`: the
/// subscription stops at that event and later events are not read.
pub(crate) fn decode_event(event_type: &str, data: &str) -> Option<StreamEvent> {
    match event_type {
        CLOSE_EVENT => {
            let reason = data.trim();
            let reason = if reason.is_empty() {
                DEFAULT_CLOSE_REASON
            } else {
                reason
            };
            Some(StreamEvent::Closed(reason.to_string()))
        }
        "" | "message" => Some(match serde_json::from_str(data) {
            Ok(payload) => StreamEvent::Update(payload),
            Err(e) => StreamEvent::Failed(StreamError::Decode {
                data: data.to_string(),
                message: e.to_string(),
            }),
        }),
        _ => None,
    }
}
