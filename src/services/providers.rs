// AI Provider Service
// Chat calls against Ollama, OpenAI-compatible endpoints and Anthropic

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::services::config_store::ConfigStore;

const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const GLM_DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured for {0}")]
    MissingApiKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    DeepSeek,
    Glm,
    Gemini,
    Anthropic,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ollama" | "local" => Some(ProviderKind::Ollama),
            "openai" => Some(ProviderKind::OpenAi),
            "deepseek" => Some(ProviderKind::DeepSeek),
            "glm" => Some(ProviderKind::Glm),
            "gemini" | "google" => Some(ProviderKind::Gemini),
            "anthropic" | "claude" => Some(ProviderKind::Anthropic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Glm => "glm",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => OLLAMA_DEFAULT_URL,
            ProviderKind::OpenAi => OPENAI_DEFAULT_URL,
            ProviderKind::DeepSeek => DEEPSEEK_DEFAULT_URL,
            ProviderKind::Glm => GLM_DEFAULT_URL,
            ProviderKind::Gemini => GEMINI_DEFAULT_URL,
            ProviderKind::Anthropic => ANTHROPIC_DEFAULT_URL,
        }
    }

    fn url_env_var(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "OLLAMA_HOST",
            ProviderKind::OpenAi => "OPENAI_API_URL",
            ProviderKind::DeepSeek => "DEEPSEEK_API_URL",
            ProviderKind::Glm => "GLM_API_URL",
            ProviderKind::Gemini => "GEMINI_API_URL",
            ProviderKind::Anthropic => "ANTHROPIC_API_URL",
        }
    }

    /// Endpoint from environment, else the built-in default.
    pub fn env_or_default_url(&self) -> String {
        env::var(self.url_env_var())
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.default_url().to_string())
    }

    pub fn needs_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "mistral",
            ProviderKind::OpenAi => "gpt-4",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Glm => "glm-4-flash",
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

/// `name[:model]`, e.g. `ollama:llama3` or `openai`.
pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: parts[0].to_string(),
            model: parts[1].to_string(),
        }
    } else {
        ProviderSpec {
            name: spec.to_string(),
            model: String::new(),
        }
    }
}

/// A fully resolved chat endpoint.
#[derive(Debug, Clone)]
pub struct ProviderTarget {
    pub kind: ProviderKind,
    pub model: String,
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

pub struct ProviderClient {
    client: Client,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub async fn chat(
        &self,
        target: &ProviderTarget,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        match target.kind {
            ProviderKind::Ollama => self.call_ollama_api(target, system, user).await,
            ProviderKind::Anthropic => self.call_anthropic_api(target, system, user, max_tokens).await,
            ProviderKind::OpenAi | ProviderKind::DeepSeek | ProviderKind::Glm | ProviderKind::Gemini => {
                self.call_chat_api(target, system, user, max_tokens).await
            }
        }
    }

    /// Model names installed on an Ollama host.
    pub async fn list_ollama_models(&self, base_url: &str) -> Result<Vec<String>, ProviderError> {
        #[derive(Deserialize)]
        struct TagsResponse {
            #[serde(default)]
            models: Vec<TagEntry>,
        }

        #[derive(Deserialize)]
        struct TagEntry {
            model: Option<String>,
            name: Option<String>,
        }

        let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        Ok(data
            .models
            .into_iter()
            .filter_map(|m| m.model.or(m.name))
            .collect())
    }

    async fn call_ollama_api(
        &self,
        target: &ProviderTarget,
        system: &str,
        user: &str,
    ) -> Result<ChatResult, ProviderError> {
        #[derive(Serialize)]
        struct OllamaRequest {
            model: String,
            messages: Vec<ChatMessage>,
            stream: bool,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            message: Option<ChatMessageResponse>,
        }

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::new("system", system));
        }
        messages.push(ChatMessage::new("user", user));

        let request = OllamaRequest {
            model: target.model.clone(),
            messages,
            stream: false,
        };

        let url = format!("{}/api/chat", target.url.trim_end_matches('/'));
        let start = Instant::now();
        let response = self.client.post(&url).json(&request).send().await?;
        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    async fn call_anthropic_api(
        &self,
        target: &ProviderTarget,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        #[derive(Serialize)]
        struct AnthropicRequest {
            model: String,
            max_tokens: i32,
            #[serde(skip_serializing_if = "String::is_empty")]
            system: String,
            messages: Vec<ChatMessage>,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Option<Vec<AnthropicContent>>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: Option<String>,
        }

        let api_key = target
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey(target.kind.name().to_string()))?;

        let request = AnthropicRequest {
            model: target.model.clone(),
            max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage::new("user", user)],
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&target.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .content
            .and_then(|c| c.into_iter().find_map(|part| part.text))
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    async fn call_chat_api(
        &self,
        target: &ProviderTarget,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let api_key = target
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey(target.kind.name().to_string()))?;

        let request = ChatRequest {
            model: target.model.clone(),
            messages: vec![ChatMessage::new("system", system), ChatMessage::new("user", user)],
            max_tokens,
            temperature: 0.2,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&target.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str) -> Option<String> {
    let kind = ProviderKind::parse(provider)?;
    let upper = kind.name().to_ascii_uppercase();
    let env_keys = [format!("{}_API_KEY", upper), format!("CONTRACT_LENS_{}_API_KEY", upper)];

    for key in &env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    let store = ConfigStore::default_config_dir().map(ConfigStore::new)?;
    store.get_api_key(kind.name()).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        let spec = parse_provider("ollama:llama3");
        assert_eq!(spec.name, "ollama");
        assert_eq!(spec.model, "llama3");

        let spec2 = parse_provider("openai");
        assert_eq!(spec2.name, "openai");
        assert_eq!(spec2.model, "");
    }

    #[test]
    fn test_provider_kind_aliases() {
        assert_eq!(ProviderKind::parse("Claude"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse(" local "), Some(ProviderKind::Ollama));
        assert_eq!(ProviderKind::parse("bard"), None);
        assert!(!ProviderKind::Ollama.needs_api_key());
        assert!(ProviderKind::DeepSeek.needs_api_key());
    }

    #[test]
    fn test_gemini_uses_openai_compatible_endpoint() {
        assert_eq!(ProviderKind::parse("Gemini"), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::Gemini.name(), "gemini");
        assert!(ProviderKind::Gemini.needs_api_key());
        assert!(ProviderKind::Gemini.default_url().ends_with("/openai/chat/completions"));
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage::new("system", "s"), ChatMessage::new("user", "u")],
            max_tokens: 256,
            temperature: 0.2,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 256);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_reported_before_sending() {
        let client = ProviderClient::new();
        let target = ProviderTarget {
            kind: ProviderKind::OpenAi,
            model: "gpt-4".to_string(),
            url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            api_key: None,
        };
        let err = client.chat(&target, "sys", "hi", 16).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey(ref p) if p == "openai"));
    }

    #[tokio::test]
    async fn test_unreachable_ollama_host() {
        let client = ProviderClient::new();
        let result = client.list_ollama_models("http://127.0.0.1:9").await;
        assert!(result.is_err());
    }
}
