//! Translation gateway: the remote translate / detect-language service.
//!
//! The pipeline talks to a [`TranslationGateway`]; the shipped
//! implementation, [`LlmGateway`], prompts a chat LLM over HTTPS.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let gateway = LlmGateway::builder(Provider::Gemini)
//!     .api_key(key)
//!     .request_timeout(Duration::from_secs(20))
//!     .build();
//! let text = gateway.translate("Hola", "English").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ChatError, Result};
use crate::providers::*;
use crate::transcript::UNKNOWN_LANGUAGE;

/// Request/response contract of the translation service.
///
/// `translate` failures propagate to the caller; `detect_language` failures
/// are expected to be mapped to `"Unknown"` by the caller or implementation.
#[async_trait]
pub trait TranslationGateway: Send + Sync {
    /// Translate `text` into the language named `target_language`.
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;

    /// Name the language `text` is written in.
    async fn detect_language(&self, text: &str) -> Result<String>;
}

/// Prompt asking for a bare translation.
pub fn translate_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following text to {}. Return only the translated text, without any additional explanation or preamble: \"{}\"",
        target_language, text
    )
}

/// Prompt asking for a bare language name.
pub fn detect_prompt(text: &str) -> String {
    format!(
        "Detect the language of the following text. Return only the name of the language (e.g., \"English\", \"Spanish\", \"Japanese\"). Do not add any other words or punctuation. Text: \"{}\"",
        text
    )
}

// ---------------------------------------------------------------------------
// LlmGateway
// ---------------------------------------------------------------------------

/// Connection settings for [`LlmGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Provider defaults: default model and base URL, 5 s connect, 30 s request.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: String::new(),
            base_url: provider.default_base_url().to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Gateway backed by an OpenAI, Anthropic or Gemini chat model.
pub struct LlmGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl LlmGateway {
    pub fn builder(provider: Provider) -> LlmGatewayBuilder {
        LlmGatewayBuilder::new(provider)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Endpoint URL for the configured provider.
    pub fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.provider {
            Provider::Openai => format!("{}/v1/chat/completions", base),
            Provider::Anthropic => format!("{}/v1/messages", base),
            Provider::Gemini => format!("{}/v1beta/models/{}:generateContent", base, self.config.model),
        }
    }

    /// Send one prompt and return the trimmed completion text.
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint();
        let request = match self.config.provider {
            Provider::Openai => self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .json(&OpenAIChatRequest {
                    model: self.config.model.clone(),
                    messages: vec![OpenAIChatMessage { role: "user".to_string(), content: prompt.to_string() }],
                    temperature: 0.0,
                }),
            Provider::Anthropic => self
                .client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&AnthropicRequest {
                    model: self.config.model.clone(),
                    messages: vec![AnthropicMessage { role: "user".to_string(), content: prompt.to_string() }],
                    max_tokens: 1024,
                    temperature: 0.0,
                }),
            Provider::Gemini => self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(&GeminiRequest {
                    contents: vec![GeminiContent {
                        role: Some("user".to_string()),
                        parts: vec![GeminiPart { text: Some(prompt.to_string()) }],
                    }],
                }),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Gateway(format!("connection to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Gateway(format!("HTTP {} from {}", status.as_u16(), url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::Gateway(format!("failed to read body: {}", e)))?;

        extract_completion(self.config.provider, &bytes)
    }
}

/// Pull the completion text out of a provider response body.
pub fn extract_completion(provider: Provider, body: &[u8]) -> Result<String> {
    let parse_err = |e: serde_json::Error| ChatError::Gateway(format!("unexpected {} response: {}", provider, e));
    let text = match provider {
        Provider::Openai => serde_json::from_slice::<OpenAIChatResponse>(body)
            .map_err(parse_err)?
            .text()
            .map(str::to_string),
        Provider::Anthropic => serde_json::from_slice::<AnthropicResponse>(body)
            .map_err(parse_err)?
            .text()
            .map(str::to_string),
        Provider::Gemini => serde_json::from_slice::<GeminiResponse>(body).map_err(parse_err)?.text(),
    };
    text.map(|t| t.trim().to_string())
        .ok_or_else(|| ChatError::Gateway(format!("{} response contained no text", provider)))
}

#[async_trait]
impl TranslationGateway for LlmGateway {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        debug!(provider = %self.config.provider, target_language, "translate request");
        self.complete(&translate_prompt(text, target_language)).await.map_err(|e| {
            warn!(error = %e, target_language, "translation failed");
            e
        })
    }

    async fn detect_language(&self, text: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(UNKNOWN_LANGUAGE.to_string());
        }
        match self.complete(&detect_prompt(text)).await {
            Ok(language) => Ok(language),
            Err(e) => {
                warn!(error = %e, "language detection failed, reporting Unknown");
                Ok(UNKNOWN_LANGUAGE.to_string())
            }
        }
    }
}

/// Builder for [`LlmGateway`].
pub struct LlmGatewayBuilder {
    config: GatewayConfig,
}

impl LlmGatewayBuilder {
    pub fn new(provider: Provider) -> Self {
        Self { config: GatewayConfig::new(provider) }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Override the provider's default base URL (proxies, test servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> LlmGateway {
        // Builder failure falls back to the default client.
        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .build()
            .unwrap_or_default();
        LlmGateway { config: self.config, client }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_prompt_names_language_and_quotes_text() {
        let p = translate_prompt("Hola", "English");
        assert!(p.starts_with("Translate the following text to English."));
        assert!(p.ends_with("\"Hola\""));
    }

    #[test]
    fn test_detect_prompt_quotes_text() {
        assert!(detect_prompt("Bonjour").ends_with("Text: \"Bonjour\""));
    }

    #[test]
    fn test_builder_defaults_follow_provider() {
        let gw = LlmGateway::builder(Provider::Anthropic).build();
        assert_eq!(gw.config().model, Provider::Anthropic.default_model());
        assert_eq!(gw.config().base_url, "https://api.anthropic.com");
        assert_eq!(gw.config().request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_overrides() {
        let gw = LlmGateway::builder(Provider::Openai)
            .api_key("k")
            .model("gpt-4o")
            .base_url("http://localhost:9999/")
            .connect_timeout(Duration::from_secs(1))
            .request_timeout(Duration::from_secs(2))
            .build();
        assert_eq!(gw.config().api_key, "k");
        assert_eq!(gw.config().model, "gpt-4o");
        assert_eq!(gw.config().connect_timeout, Duration::from_secs(1));
        assert_eq!(gw.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn test_gemini_endpoint_embeds_model() {
        let gw = LlmGateway::builder(Provider::Gemini).model("gemini-flash-latest").build();
        assert_eq!(
            gw.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_extract_completion_trims() {
        let body = br#"{"choices":[{"message":{"content":"  Hello \n"}}]}"#;
        assert_eq!(extract_completion(Provider::Openai, body).unwrap(), "Hello");
    }

    #[test]
    fn test_extract_completion_missing_text_is_gateway_error() {
        let body = br#"{"content":[]}"#;
        let err = extract_completion(Provider::Anthropic, body).unwrap_err();
        assert!(matches!(err, ChatError::Gateway(_)));
    }

    #[test]
    fn test_extract_completion_malformed_body() {
        let err = extract_completion(Provider::Gemini, b"not json").unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }

    #[tokio::test]
    async fn test_empty_text_short_circuits() {
        let gw = LlmGateway::builder(Provider::Openai).base_url("http://127.0.0.1:1").build();
        assert_eq!(gw.translate("", "German").await.unwrap(), "");
        assert_eq!(gw.detect_language("").await.unwrap(), UNKNOWN_LANGUAGE);
    }

    #[tokio::test]
    async fn test_detect_failure_maps_to_unknown() {
        let gw = LlmGateway::builder(Provider::Openai)
            .base_url("http://127.0.0.1:1")
            .connect_timeout(Duration::from_millis(200))
            .request_timeout(Duration::from_millis(500))
            .build();
        assert_eq!(gw.detect_language("Hola").await.unwrap(), UNKNOWN_LANGUAGE);
    }

    #[tokio::test]
    async fn test_translate_failure_propagates() {
        let gw = LlmGateway::builder(Provider::Openai)
            .base_url("http://127.0.0.1:1")
            .connect_timeout(Duration::from_millis(200))
            .request_timeout(Duration::from_millis(500))
            .build();
        assert!(matches!(gw.translate("Hola", "English").await, Err(ChatError::Gateway(_))));
    }
}
