//! HTTP clients for the hosted text-generation services.
//!
//! Two wire formats cover the three providers: Gemini's `generateContent`
//! for the primary slot and the OpenAI-style chat completions API for the
//! secondary and tertiary slots.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use thiserror::Error;

use super::config::{is_placeholder, ProviderConfig, ProviderName};
use super::prompt::{Prompt, SYSTEM_PROMPT};

/// Why a single provider attempt produced no answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider credential is not configured")]
    NotConfigured,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider answered with HTTP {0}")]
    HttpStatus(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// One external text-generation service.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Wall-clock bound for one [`generate`](Self::generate) call.
    fn timeout(&self) -> Duration;

    /// Generate a reply for `prompt`. Performs exactly one request.
    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// Build the client matching the wire format of `config.name`.
pub fn build_client(http: Client, config: ProviderConfig) -> Arc<dyn ProviderClient> {
    match config.name {
        ProviderName::Primary => Arc::new(GeminiClient::new(http, config)),
        ProviderName::Secondary | ProviderName::Tertiary => {
            Arc::new(ChatCompletionsClient::new(http, config))
        }
    }
}

pub struct GeminiClient {
    http: Client,
    config: ProviderConfig,
}

impl GeminiClient {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "contents": [
                {
                    "parts": [{ "text": format!("{SYSTEM_PROMPT}\n\n{}", prompt.merged_text()) }]
                }
            ],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        })
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn name(&self) -> ProviderName {
        self.config.name
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let secret = usable_secret(&self.config)?;
        let url = format!(
            "{}/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let request = self
            .http
            .post(url)
            .query(&[("key", secret)])
            .timeout(self.timeout())
            .json(&self.request_body(prompt));

        let body = send_json(request, self.timeout()).await?;
        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|cand| cand.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(|text| text.as_str());
        non_empty(text, "candidates[0].content.parts[0].text")
    }
}

/// OpenAI-compatible `/chat/completions` client, shared by every provider
/// that speaks that dialect.
pub struct ChatCompletionsClient {
    http: Client,
    config: ProviderConfig,
}

impl ChatCompletionsClient {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];
        if let Some(block) = prompt.context_block() {
            messages.push(json!({ "role": "system", "content": block }));
        }
        messages.push(json!({ "role": "user", "content": prompt.message() }));

        json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_output_tokens,
            "temperature": self.config.temperature,
        })
    }
}

#[async_trait]
impl ProviderClient for ChatCompletionsClient {
    fn name(&self) -> ProviderName {
        self.config.name
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let secret = usable_secret(&self.config)?;
        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let request = self
            .http
            .post(url)
            .bearer_auth(secret)
            .timeout(self.timeout())
            .json(&self.request_body(prompt));

        let body = send_json(request, self.timeout()).await?;
        let text = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|val| val.as_str());
        non_empty(text, "choices[0].message.content")
    }
}

fn usable_secret(config: &ProviderConfig) -> Result<&str, ProviderError> {
    if config.endpoint.trim().is_empty() {
        return Err(ProviderError::NotConfigured);
    }
    config
        .credential
        .as_ref()
        .map(|secret| secret.expose_secret())
        .filter(|secret| !is_placeholder(secret))
        .ok_or(ProviderError::NotConfigured)
}

async fn send_json(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|err| classify(err, timeout))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::HttpStatus(status.as_u16()));
    }
    response
        .json::<Value>()
        .await
        .map_err(|err| classify(err, timeout))
}

fn classify(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if err.is_decode() {
        ProviderError::MalformedResponse(err.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}

fn non_empty(text: Option<&str>, field: &str) -> Result<String, ProviderError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        Some(_) => Err(ProviderError::MalformedResponse(format!("{field} is empty"))),
        None => Err(ProviderError::MalformedResponse(format!("{field} is missing"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gemini(server: &MockServer) -> GeminiClient {
        let config = ProviderConfig::defaults(ProviderName::Primary)
            .with_endpoint(format!("{}/models", server.uri()))
            .with_credential("g-key")
            .with_timeout_ms(500);
        GeminiClient::new(Client::new(), config)
    }

    fn chat(server: &MockServer, name: ProviderName) -> ChatCompletionsClient {
        let config = ProviderConfig::defaults(name)
            .with_endpoint(server.uri())
            .with_credential("sk-test")
            .with_timeout_ms(500);
        ChatCompletionsClient::new(Client::new(), config)
    }

    fn prompt(message: &str) -> Prompt {
        Prompt::new(message, None).unwrap()
    }

    #[tokio::test]
    async fn gemini_posts_generate_content_and_reads_first_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(json!({
                "generationConfig": { "maxOutputTokens": 200 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "Take a 5-minute break." }] } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = gemini(&server).generate(&prompt("this is hard")).await.unwrap();
        assert_eq!(text, "Take a 5-minute break.");
    }

    #[tokio::test]
    async fn gemini_prompt_embeds_system_instruction_and_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .mount(&server)
            .await;

        let mut context = Map::new();
        context.insert("subject".into(), json!("math"));
        let prompt = Prompt::new("derivatives?", Some(&context)).unwrap();
        gemini(&server).generate(&prompt).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with(SYSTEM_PROMPT));
        assert!(text.ends_with("Context: {\"subject\":\"math\"}\n\nderivatives?"));
    }

    #[tokio::test]
    async fn chat_completions_sends_bearer_and_context_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 200,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "system", "content": "Context: {\"subject\":\"math\"}" },
                    { "role": "user", "content": "derivatives?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Practice daily." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut context = Map::new();
        context.insert("subject".into(), json!("math"));
        let prompt = Prompt::new("derivatives?", Some(&context)).unwrap();
        let text = chat(&server, ProviderName::Secondary)
            .generate(&prompt)
            .await
            .unwrap();
        assert_eq!(text, "Practice daily.");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = chat(&server, ProviderName::Tertiary)
            .generate(&prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::HttpStatus(429));
    }

    #[tokio::test]
    async fn unexpected_shapes_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let chat_err = chat(&server, ProviderName::Secondary)
            .generate(&prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(chat_err, ProviderError::MalformedResponse(_)));

        let gemini_err = gemini(&server).generate(&prompt("hi")).await.unwrap_err();
        assert!(matches!(gemini_err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn blank_generated_text_is_not_an_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "   " } }]
            })))
            .mount(&server)
            .await;

        let err = chat(&server, ProviderName::Secondary)
            .generate(&prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn generated_text_is_returned_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "  Breathe in.\n" } }]
            })))
            .mount(&server)
            .await;

        let text = chat(&server, ProviderName::Tertiary)
            .generate(&prompt("exam tomorrow"))
            .await
            .unwrap();
        assert_eq!(text, "  Breathe in.\n");
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(json!({ "choices": [{ "message": { "content": "late" } }] })),
            )
            .mount(&server)
            .await;

        let err = chat(&server, ProviderName::Secondary)
            .generate(&prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Timeout(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn missing_credential_never_touches_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = ProviderConfig::defaults(ProviderName::Secondary)
            .with_endpoint(server.uri())
            .with_credential("your-openai-api-key");
        let err = ChatCompletionsClient::new(Client::new(), config)
            .generate(&prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured);
    }

    #[tokio::test]
    async fn connection_refused_is_transport() {
        let config = ProviderConfig::defaults(ProviderName::Secondary)
            .with_endpoint("http://127.0.0.1:9")
            .with_credential("sk-test")
            .with_timeout_ms(2_000);
        let err = ChatCompletionsClient::new(Client::new(), config)
            .generate(&prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)), "got {err:?}");
    }

    #[test]
    fn factory_picks_wire_format_by_slot() {
        let http = Client::new();
        for name in ProviderName::ALL {
            let client = build_client(http.clone(), ProviderConfig::defaults(name));
            assert_eq!(client.name(), name);
        }
    }
}
