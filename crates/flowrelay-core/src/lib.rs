//! `flowrelay` Core Library
//!
//! Shared functionality for `flowrelay` components:
//! - Relay configuration and tweaks loading
//! - Tracing subscriber initialisation
//! - Common error types

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::{RelayConfig, Tweaks};
pub use error::{Error, Result};
