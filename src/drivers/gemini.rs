//! Google Gemini `generateContent` driver.
//!
//! - Prompt goes into `contents[0].parts[0].text` with role `user`.
//! - `generationConfig` wraps temperature, `maxOutputTokens` and `responseMimeType`.
//! - Response text is the concatenation of `candidates[0].content.parts[*].text`.
//! - API key travels in the `x-goog-api-key` header, never in the URL.
//! - Throttling (HTTP 429 or `RESOURCE_EXHAUSTED`) becomes [`Error::RateLimited`].

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{GenerationSettings, TextModel};
use crate::config::{GeminiConfig, GEMINI_API_KEY};
use crate::error_code::StandardErrorCode;
use crate::transport::{remote_error, HttpTransport};
use crate::{Error, ErrorContext, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST client bound to one model.
pub struct GeminiDriver {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    settings: GenerationSettings,
}

impl std::fmt::Debug for GeminiDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiDriver")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl GeminiDriver {
    pub fn new(transport: &HttpTransport, config: &GeminiConfig) -> Self {
        Self {
            client: transport.client(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            settings: GenerationSettings {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                json_output: config.json_output,
            },
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Request body for a single user turn.
    pub fn build_request(&self, prompt: &str) -> Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
        });

        let mut gen_config = json!({});
        if let Some(t) = self.settings.temperature {
            gen_config["temperature"] = json!(t);
        }
        if let Some(mt) = self.settings.max_output_tokens {
            gen_config["maxOutputTokens"] = json!(mt);
        }
        if self.settings.json_output {
            gen_config["responseMimeType"] = json!("application/json");
        }
        if gen_config != json!({}) {
            body["generationConfig"] = gen_config;
        }
        body
    }

    /// Text of the first candidate.
    pub fn parse_response(body: &Value) -> Result<String> {
        let text: String = body
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            let reason = body
                .pointer("/candidates/0/finishReason")
                .or_else(|| body.pointer("/promptFeedback/blockReason"))
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            return Err(Error::parse_with_context(
                "model returned no text",
                ErrorContext::new()
                    .with_field_path("candidates[0].content.parts")
                    .with_details(reason)
                    .with_source("gemini"),
            ));
        }
        Ok(text)
    }

    /// Typed error for a non-2xx response.
    pub fn classify_error(status: u16, body: &str) -> Error {
        match remote_error(status, body) {
            Error::Remote {
                class: StandardErrorCode::RateLimited,
                message,
                ..
            } => Error::rate_limited(message),
            Error::Remote { message, .. } if message.to_lowercase().contains("quota") => {
                Error::Remote {
                    status,
                    class: StandardErrorCode::QuotaExhausted,
                    message,
                }
            }
            other => other,
        }
    }
}

#[async_trait]
impl TextModel for GeminiDriver {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                format!(
                    "{name} is not set. Please check your environment has {name}.",
                    name = GEMINI_API_KEY
                ),
                ErrorContext::new()
                    .with_field_path(GEMINI_API_KEY)
                    .with_source("gemini"),
            )
        })?;

        debug!(model = %self.model, prompt_len = prompt.len(), "calling generateContent");
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(http_status = status.as_u16(), "generateContent failed");
            return Err(Self::classify_error(status.as_u16(), &body));
        }

        let body: Value = response.json().await?;
        Self::parse_response(&body)
    }
}
