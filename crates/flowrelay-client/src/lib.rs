//! Flow engine client.
//!
//! Provides a reqwest-based client for the Langflow run API: a single
//! authenticated run request, and an optional server-sent event
//! subscription to the run's stream URL.

mod client;
pub mod error;
pub mod stream;
pub mod types;


pub use client::{FlowClient, FlowClientConfig, FlowRun};
pub use error::{FlowClientError, FlowExecutionError, StreamError};
pub use stream::{StreamEvent, StreamObserver, StreamSubscription, SubscriptionHandle};
pub use types::{IoType, RunPhase, RunRequest, RunResponse};
