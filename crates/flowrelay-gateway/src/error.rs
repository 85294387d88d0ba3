//! Relay error envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowrelay_client::{FlowClientError, FlowExecutionError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Anything that stops `/run-flow` from answering with success.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid request body: {0}")]
    BadRequest(#[from] JsonRejection),

    #[error(transparent)]
    Execution(#[from] FlowExecutionError),

    #[error(transparent)]
    Response(#[from] FlowClientError),
}

impl RelayError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Execution(_) | Self::Response(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorReply {
    success: bool,
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(status = status.as_u16(), error = %self, "Error in /run-flow");
        let body = ErrorReply {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
