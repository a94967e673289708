//! OpenAI-compatible chat completions gateway.
//!
//! Works against any `/chat/completions` endpoint: hosted APIs, vLLM,
//! llama.cpp server, Ollama's OpenAI shim.

use std::time::Duration;

use async_trait::async_trait;
use javalab_engine::{ChatMessage, ChatRequest, ModelGateway, TierError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelEndpoint;
use crate::http;

pub struct ChatGateway {
    client: reqwest::Client,
    endpoint: ModelEndpoint,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatGateway {
    pub fn new(endpoint: ModelEndpoint, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            endpoint,
            timeout,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelGateway for ChatGateway {
    async fn complete(&self, request: ChatRequest) -> Result<String, TierError> {
        let body = request_body(&self.endpoint.model, &request);
        debug!(
            model = %self.endpoint.model,
            messages = request.messages.len(),
            json_mode = request.json_mode,
            "Chat completion request"
        );

        let mut builder = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;
        let text = http::read_body(response, self.timeout).await?;
        parse_reply(&text)
    }
}

fn request_body<'a>(model: &'a str, request: &'a ChatRequest) -> CompletionBody<'a> {
    CompletionBody {
        model,
        messages: &request.messages,
        temperature: request.temperature,
        response_format: request
            .json_mode
            .then_some(ResponseFormat { kind: "json_object" }),
    }
}

/// Content of the first choice.
pub fn parse_reply(body: &str) -> Result<String, TierError> {
    let reply: CompletionReply = serde_json::from_str(body)?;
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| TierError::malformed("completion has no message content"))
}
