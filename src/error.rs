//! Application error types and the error-handler contract.
//!
//! Handlers and middleware return `anyhow::Result<()>`. Whatever error comes
//! out of the pipeline is handed, once, to an [`ErrorHandler`]. An
//! [`HttpError`] anywhere in the error chain decides the status code; any
//! other error is a 500.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};

/// An error that maps onto an HTTP status code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Converts a pipeline error into a response.
///
/// A panic inside the handler itself is not caught; it tears down the
/// connection that was being answered.
pub type ErrorHandler = Arc<dyn Fn(&anyhow::Error, &Request, &mut Response) + Send + Sync>;

/// Status code for an arbitrary pipeline error.
pub fn status_of(err: &anyhow::Error) -> StatusCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<HttpError>())
        .map(HttpError::status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Answers with `{"error": {"status": <code>, "message": <text>}}`.
pub fn default_error_handler(err: &anyhow::Error, req: &Request, res: &mut Response) {
    let status = status_of(err);

    if status.as_u16() >= 500 {
        tracing::error!(method = %req.method, path = %req.path, status = status.as_u16(), error = %err, "request failed");
    } else {
        tracing::debug!(method = %req.method, path = %req.path, status = status.as_u16(), error = %err, "request rejected");
    }

    res.status(status.as_u16()).json(&json!({
        "error": {
            "status": status.as_u16(),
            "message": err.to_string(),
        }
    }));
}
