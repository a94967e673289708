//! Shared reqwest plumbing for the adapters.

use std::time::Duration;

use anyhow::{Context, Result};
use javalab_engine::TierError;

/// Longest service error body kept in a [`TierError::Service`] message.
const MAX_ERROR_BODY: usize = 300;

/// Build a client whose every request carries `timeout`.
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("javalab/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Map a reqwest failure onto the engine's tier taxonomy.
pub fn transport_error(err: reqwest::Error, timeout: Duration) -> TierError {
    if err.is_timeout() {
        TierError::Timeout {
            after: timeout,
            hint: "request timed out".to_string(),
        }
    } else {
        TierError::Transport(err.to_string())
    }
}

/// Read a response body, turning non-2xx statuses into service errors.
pub async fn read_body(response: reqwest::Response, timeout: Duration) -> Result<String, TierError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(e, timeout))?;
    if !status.is_success() {
        return Err(TierError::Service {
            status: status.as_u16(),
            message: snippet(&body),
        });
    }
    Ok(body)
}

/// First `MAX_ERROR_BODY` characters of `body`, on one line.
pub fn snippet(body: &str) -> String {
    let flat: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_ERROR_BODY {
        flat
    } else {
        let cut: String = flat.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    }
}
