//! flowrelay gateway
//!
//! Single-route HTTP relay: `POST /run-flow` starts a run on the flow
//! engine and answers with its text output, or with an acknowledgment when
//! the run streams.

pub mod error;
pub mod observer;
pub mod routes;

pub use error::RelayError;
pub use routes::{AppState, build_router};
