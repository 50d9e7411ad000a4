//! Timeout enforcement and transport error taxonomy.
//!
//! # Responsibilities
//! - Wrap a single probe request with a deadline
//! - Translate client failures into `TransportError` kinds
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the deadline covers connect + headers
//! - Timeout errors are distinct from other errors
//! - Non-2xx responses are errors that keep their status code

use std::time::Duration;

use thiserror::Error;

/// Failure of one transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call was aborted because the deadline passed.
    #[error("request aborted: timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Connection-level failure (refused, reset, DNS).
    #[error("network failure: {0}")]
    Network(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// The response body could not be read or decoded.
    #[error("invalid response body: {0}")]
    Body(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn timeout(after: Duration) -> Self {
        TransportError::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }

    /// Map a client error onto the taxonomy.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::timeout(timeout)
        } else if err.is_connect() || err.is_request() {
            TransportError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Http {
                status: status.as_u16(),
            }
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Issue one GET and fail with `Timeout` if it has not resolved after `timeout`.
pub async fn fetch_with_timeout(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<reqwest::Response, TransportError> {
    let request = client
        .get(url)
        .header("user-agent", concat!("health-poller/", env!("CARGO_PKG_VERSION")))
        .send();

    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(response)) => {
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else {
                tracing::debug!(url = %url, status = %status, "Probe returned non-success status");
                Err(TransportError::Http {
                    status: status.as_u16(),
                })
            }
        }
        Ok(Err(e)) => Err(TransportError::from_reqwest(&e, timeout)),
        Err(_) => Err(TransportError::timeout(timeout)),
    }
}
