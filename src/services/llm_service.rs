use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(format!("expected 'openai' or 'gemini', got '{}'", other)),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenAi => f.write_str("openai"),
            LlmProvider::Gemini => f.write_str("gemini"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: LlmProvider,
        status: u16,
        body: String,
    },

    #[error("{0} returned no content")]
    EmptyResponse(LlmProvider),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            system: None,
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

/// A text-completion backend. Implementations are picked once at startup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn provider(&self) -> LlmProvider;

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> std::result::Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> std::result::Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let req = ChatRequest {
            model: &self.model,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            messages,
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Sending request to OpenAI");
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: LlmProvider::OpenAi,
                status,
                body,
            });
        }

        let body: ChatResponse = res.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse(LlmProvider::OpenAi))
    }
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> std::result::Result<String, LlmError> {
        // Gemini has no system role here; the instruction rides in front of the prompt.
        let text = match options.system.as_deref() {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        let req = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            },
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Sending request to Gemini");
        let res = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: LlmProvider::Gemini,
                status,
                body,
            });
        }

        let body: GeminiResponse = res.json().await?;
        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse(LlmProvider::Gemini))
    }
}

/// Picks the backend once from configuration. A Gemini preference without a
/// Gemini key falls back to OpenAI.
pub fn build_backend(config: &Config, client: Client) -> Result<Arc<dyn LlmBackend>> {
    let provider = match (config.preferred_llm, config.gemini_api_key.is_some()) {
        (LlmProvider::Gemini, true) => LlmProvider::Gemini,
        (LlmProvider::Gemini, false) => {
            tracing::warn!("PREFERRED_LLM=gemini but GEMINI_API_KEY is not set, falling back to OpenAI");
            LlmProvider::OpenAi
        }
        (LlmProvider::OpenAi, _) => LlmProvider::OpenAi,
    };

    match provider {
        LlmProvider::Gemini => {
            let key = config.gemini_api_key.clone().unwrap_or_default();
            tracing::info!(model = %config.gemini_model, "Using Gemini backend");
            Ok(Arc::new(GeminiBackend::new(
                client,
                key,
                config.gemini_model.clone(),
                config.gemini_base_url.clone(),
            )))
        }
        LlmProvider::OpenAi => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| Error::Config("Missing environment variable: OPENAI_API_KEY".to_string()))?;
            tracing::info!(model = %config.openai_model, "Using OpenAI backend");
            Ok(Arc::new(OpenAiBackend::new(
                client,
                key,
                config.openai_model.clone(),
                config.openai_base_url.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!(" gemini ".parse::<LlmProvider>().unwrap(), LlmProvider::Gemini);
        assert!("claude".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn gemini_without_key_falls_back_to_openai() {
        let config = Config {
            preferred_llm: LlmProvider::Gemini,
            openai_api_key: Some("sk-test".into()),
            ..Config::default()
        };
        let backend = build_backend(&config, Client::new()).unwrap();
        assert_eq!(backend.provider(), LlmProvider::OpenAi);
    }

    #[test]
    fn gemini_with_key_is_selected() {
        let config = Config {
            preferred_llm: LlmProvider::Gemini,
            gemini_api_key: Some("g-test".into()),
            ..Config::default()
        };
        let backend = build_backend(&config, Client::new()).unwrap();
        assert_eq!(backend.provider(), LlmProvider::Gemini);
    }

    #[test]
    fn missing_openai_key_is_a_config_error() {
        let config = Config::default();
        assert!(matches!(
            build_backend(&config, Client::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn openai_request_omits_system_when_absent() {
        let req = ChatRequest {
            model: "gpt-4o-mini",
            temperature: 0.3,
            max_tokens: 10,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn gemini_request_uses_camel_case_config() {
        let req = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: "hi".into() }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.3,
                max_output_tokens: 4000,
            },
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4000);
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    }
}
