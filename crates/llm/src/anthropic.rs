//! Anthropic messages API provider.
//!
//! The stage instruction goes in the `system` field and the payload is the
//! single user turn. The API has no JSON mode, so JSON-mode requests get a
//! one-line reminder appended to the system text; the stages parse leniently
//! either way.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{GenerationError, GenerationRequest, ResponseFormat, TextGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::{build_client, map_status, map_transport, mask_api_key};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

const JSON_REMINDER: &str = "Respond with a single JSON object only.";

#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn response_text(response: MessagesResponse) -> Option<String> {
    let text: String = response
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// # Errors
    ///
    /// [`GenerationError::NotConfigured`] when the key is blank or the HTTP
    /// client cannot be built.
    pub fn new(config: AnthropicConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured("Anthropic API key is empty".into()));
        }
        let client = build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }
}

#[async_trait]
impl TextGenerator for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip_all, fields(stage = %request.stage, model = %self.config.model))]
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let system = match request.format {
            ResponseFormat::Json => format!("{}\n\n{JSON_REMINDER}", request.instruction),
            ResponseFormat::Text => request.instruction.clone(),
        };
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages: [Message {
                role: "user",
                content: &request.payload,
            }],
        };

        debug!("sending messages request");
        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport(&e, self.config.timeout))?;

        if !response.status().is_success() {
            return Err(map_status(response, &self.config.api_key).await);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("invalid response body: {e}")))?;

        response_text(parsed).ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::Stage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> AnthropicProvider {
        let config = AnthropicConfig::new("ak-test-key-123456").with_base_url(server.uri());
        AnthropicProvider::new(config).unwrap()
    }

    #[tokio::test]
    async fn joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "ak-test-key-123456"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": "the plan"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "text", "text": "Friends, "},
                    {"type": "text", "text": "what a year."}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .generate(GenerationRequest::text(Stage::Drafter, "write", "the plan"))
            .await
            .unwrap();

        assert_eq!(reply, "Friends, what a year.");
    }

    #[tokio::test]
    async fn json_requests_carry_the_reminder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "system": format!("judge\n\n{JSON_REMINDER}")
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "{\"winner\": 2}"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .generate(GenerationRequest::json(Stage::Judge, "judge", "{}"))
            .await
            .unwrap();

        assert_eq!(reply, "{\"winner\": 2}");
    }

    #[tokio::test]
    async fn client_errors_are_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate(GenerationRequest::text(Stage::Editor, "polish", "text"))
            .await
            .unwrap_err();

        assert_eq!(err.retry_policy(), pipeline::RetryPolicy::NonRetryable);
    }

    #[tokio::test]
    async fn no_text_blocks_is_an_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": [] })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate(GenerationRequest::text(Stage::Editor, "polish", "text"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::EmptyResponse));
    }
}
