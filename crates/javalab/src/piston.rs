//! Piston-compatible remote sandbox client.

use std::time::Duration;

use async_trait::async_trait;
use javalab_engine::execution::sandbox::{SandboxRequest, SandboxResponse};
use javalab_engine::{SandboxService, TierError};
use tracing::debug;

use crate::http;

pub struct PistonClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl PistonClient {
    /// `url` is the full execute endpoint, e.g. `.../api/v2/piston/execute`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SandboxService for PistonClient {
    async fn execute(&self, request: SandboxRequest) -> Result<SandboxResponse, TierError> {
        debug!(url = %self.url, language = %request.language, "Submitting to sandbox");
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;
        let body = http::read_body(response, self.timeout).await?;
        parse_response(&body)
    }
}

/// Decode an execute response. Piston reports request-level failures as a
/// 200 with only a `message` field, which is surfaced as a service error.
pub fn parse_response(body: &str) -> Result<SandboxResponse, TierError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if value.get("run").is_none() {
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("response has no run stage");
        return Err(TierError::Service {
            status: 200,
            message: message.to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use javalab_engine::Classification;

    #[test]
    fn test_parse_run_only_response() {
        let body = r#"{"language":"java","version":"15.0.2",
            "run":{"stdout":"hi\n","stderr":"","output":"hi\n","code":0,"signal":null}}"#;
        let response = parse_response(body).unwrap();
        assert!(response.compile.is_none());
        let result = response.into_result();
        assert_eq!(result.classification(), Classification::Success);
        assert_eq!(result.output_text(), "hi\n");
    }

    #[test]
    fn test_parse_killed_run() {
        let body = r#"{"run":{"stdout":"","stderr":"","output":"","code":null,"signal":"SIGKILL"}}"#;
        let result = parse_response(body).unwrap().into_result();
        assert!(result.is_error());
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_message_only_body_is_service_error() {
        let err = parse_response(r#"{"message":"java-99 runtime is unknown"}"#).unwrap_err();
        assert!(matches!(err, TierError::Service { status: 200, .. }));
        assert!(err.to_string().contains("runtime is unknown"));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse_response("<html>502</html>").unwrap_err();
        assert!(matches!(err, TierError::MalformedResponse(_)));
    }
}
