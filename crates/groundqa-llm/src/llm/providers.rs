//! LLM API Providers
//!
//! Concrete implementations for Gemini, OpenAI, Anthropic, and local
//! OpenAI-compatible servers.

use super::*;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

pub const GROUNDQA_LLM_PROVIDER_ENV: &str = "GROUNDQA_LLM_PROVIDER";
pub const GROUNDQA_LLM_TIMEOUT_SECS_ENV: &str = "GROUNDQA_LLM_TIMEOUT_SECS";

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Legacy name for the Gemini credential.
pub const API_KEY_ENV: &str = "API_KEY";
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";
pub const GEMINI_BASE_URL_ENV: &str = "GEMINI_BASE_URL";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_MODEL_ENV: &str = "ANTHROPIC_MODEL";
pub const ANTHROPIC_BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const ANTHROPIC_VERSION_ENV: &str = "ANTHROPIC_VERSION";
pub const LOCAL_LLM_URL_ENV: &str = "LOCAL_LLM_URL";
pub const LOCAL_LLM_MODEL_ENV: &str = "LOCAL_LLM_MODEL";

pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_OUTPUT_TOKENS: usize = 2048;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_LOCAL_MODEL: &str = "default";

/// LLM configuration loaded from environment or command-line flags
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    /// Client-side bound on a single completion call. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Only used by Anthropic.
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
    Local,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Local => "local",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAI),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "local" | "ollama" | "vllm" => Ok(Provider::Local),
            other => Err(ConfigError::Invalid(format!(
                "unknown LLM provider {other:?} (expected gemini|openai|anthropic|local)"
            ))),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LLMConfig {
    /// Load from a variable source such as `|name| std::env::var(name).ok()`.
    ///
    /// Precedence:
    /// 1) `GROUNDQA_LLM_PROVIDER` picks the provider explicitly
    /// 2) otherwise the first configured of Gemini, OpenAI, Anthropic, local
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout = match get(GROUNDQA_LLM_TIMEOUT_SECS_ENV) {
            Some(v) => parse_timeout_secs(&v)?,
            None => Some(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS)),
        };

        let gemini_key = get(GEMINI_API_KEY_ENV).or_else(|| get(API_KEY_ENV));
        let explicit = get(GROUNDQA_LLM_PROVIDER_ENV)
            .map(|v| v.parse::<Provider>())
            .transpose()?;

        let provider = match explicit {
            Some(p) => p,
            None if gemini_key.is_some() => Provider::Gemini,
            None if get(OPENAI_API_KEY_ENV).is_some() => Provider::OpenAI,
            None if get(ANTHROPIC_API_KEY_ENV).is_some() => Provider::Anthropic,
            None if get(LOCAL_LLM_URL_ENV).is_some() => Provider::Local,
            None => return Err(ConfigError::NoProviderConfigured),
        };

        let missing = |name: &str| ConfigError::MissingCredential {
            provider,
            var: name.to_string(),
        };

        let mut config = match provider {
            Provider::Gemini => Self::gemini(
                &gemini_key.ok_or_else(|| missing(GEMINI_API_KEY_ENV))?,
                &get(GEMINI_MODEL_ENV).unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            )
            .with_base_url(get(GEMINI_BASE_URL_ENV)),
            Provider::OpenAI => Self::openai(
                &get(OPENAI_API_KEY_ENV).ok_or_else(|| missing(OPENAI_API_KEY_ENV))?,
                &get(OPENAI_MODEL_ENV).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            )
            .with_base_url(get(OPENAI_BASE_URL_ENV)),
            Provider::Anthropic => {
                let mut config = Self::anthropic(
                    &get(ANTHROPIC_API_KEY_ENV).ok_or_else(|| missing(ANTHROPIC_API_KEY_ENV))?,
                    &get(ANTHROPIC_MODEL_ENV)
                        .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                )
                .with_base_url(get(ANTHROPIC_BASE_URL_ENV));
                if let Some(version) = get(ANTHROPIC_VERSION_ENV) {
                    config.api_version = Some(version);
                }
                config
            }
            Provider::Local => Self::local(
                &get(LOCAL_LLM_URL_ENV).ok_or_else(|| missing(LOCAL_LLM_URL_ENV))?,
                &get(LOCAL_LLM_MODEL_ENV).unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            ),
        };
        config.timeout = timeout;
        Ok(config)
    }

    /// Create Gemini config
    pub fn gemini(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::Gemini,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout: Some(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS)),
            api_version: None,
        }
    }

    /// Create OpenAI config
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::OpenAI,
            ..Self::gemini(api_key, model)
        }
    }

    /// Create Anthropic config
    pub fn anthropic(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::Anthropic,
            api_version: Some(DEFAULT_ANTHROPIC_VERSION.to_string()),
            ..Self::gemini(api_key, model)
        }
    }

    /// Create local config
    pub fn local(url: &str, model: &str) -> Self {
        Self {
            provider: Provider::Local,
            base_url: Some(url.to_string()),
            ..Self::gemini("", model)
        }
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if base_url.is_some() {
            self.base_url = base_url;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn status_line(&self) -> String {
        let timeout = match self.timeout {
            Some(t) => format!("{}s", t.as_secs()),
            None => "none".to_string(),
        };
        format!(
            "llm: provider={} model={} base_url={} timeout={timeout}",
            self.provider,
            self.model,
            self.effective_base_url(),
        )
    }

    fn effective_base_url(&self) -> String {
        let default = match self.provider {
            Provider::Gemini => DEFAULT_GEMINI_BASE_URL,
            Provider::OpenAI => DEFAULT_OPENAI_BASE_URL,
            Provider::Anthropic => DEFAULT_ANTHROPIC_BASE_URL,
            Provider::Local => "",
        };
        // Local servers are usually plain HTTP on loopback.
        let scheme = if self.provider == Provider::Local {
            "http"
        } else {
            "https"
        };
        normalize_http_base_url(self.base_url.as_deref().unwrap_or(default), scheme)
    }
}

/// Parse a timeout in whole seconds; `0` disables the timeout.
pub fn parse_timeout_secs(value: &str) -> Result<Option<Duration>, ConfigError> {
    let v = value.trim();
    let secs = v.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid {GROUNDQA_LLM_TIMEOUT_SECS_ENV}={v:?} (expected integer seconds; 0 disables)"
        ))
    })?;
    Ok(if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    })
}

fn normalize_http_base_url(base_url: &str, scheme: &str) -> String {
    let mut host = base_url.trim().to_string();
    if !host.is_empty() && !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("{scheme}://{host}");
    }
    host.trim_end_matches('/').to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "No LLM provider configured. Set GEMINI_API_KEY (or API_KEY), OPENAI_API_KEY, ANTHROPIC_API_KEY, or LOCAL_LLM_URL"
    )]
    NoProviderConfigured,
    #[error("{provider} provider requires {var}")]
    MissingCredential { provider: Provider, var: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

fn build_http_client(config: &LLMConfig) -> Result<Client, ConfigError> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

fn map_send_error(e: reqwest::Error, timeout: Option<Duration>, url: &str) -> LLMError {
    match timeout {
        Some(t) if e.is_timeout() => LLMError::Timeout(t),
        _ => LLMError::Network(format!("failed to reach {url}: {e}")),
    }
}

/// Send a JSON request and decode a JSON response, mapping HTTP failures.
async fn send_json(
    request: RequestBuilder,
    body: &Value,
    timeout: Option<Duration>,
    url: &str,
) -> Result<Value, LLMError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| map_send_error(e, timeout, url))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(LLMError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(LLMError::Api(format!(
            "http {}: {}",
            status.as_u16(),
            error_text.trim()
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| match timeout {
            Some(t) if e.is_timeout() => LLMError::Timeout(t),
            _ => LLMError::InvalidResponse(e.to_string()),
        })
}

fn non_empty(content: String, what: &str) -> Result<String, LLMError> {
    if content.trim().is_empty() {
        Err(LLMError::InvalidResponse(format!(
            "{what}: no text in response (unexpected response shape)"
        )))
    } else {
        Ok(content)
    }
}

fn chat_messages(request: &CompletionRequest) -> Vec<Value> {
    request
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}

/// Decode an OpenAI-style `chat/completions` response.
fn chat_completion_response(data: &Value, model: &str, what: &str) -> Result<CompletionResponse, LLMError> {
    let content = data["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let finish_reason = match data["choices"][0]["finish_reason"].as_str() {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    Ok(CompletionResponse {
        content: non_empty(content, what)?,
        finish_reason,
        usage: Usage {
            prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
        },
        model: model.to_string(),
    })
}

// ============================================================================
// Gemini Provider
// ============================================================================

pub struct GeminiClient {
    client: Client,
    config: LLMConfig,
}

impl GeminiClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let base_url = self.config.effective_base_url();
        let url = format!(
            "{base_url}/v1beta/models/{}:generateContent",
            self.config.model
        );

        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": "user", "parts": [{ "text": m.content }] }))
            .collect();

        let mut generation_config = json!({});
        if let Some(temp) = request.temperature {
            generation_config["temperature"] = json!(temp);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = request.system_text() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        debug!(model = %self.config.model, temperature = ?request.temperature, "gemini generateContent");
        let data = send_json(
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key),
            &body,
            self.config.timeout,
            &url,
        )
        .await?;

        let content = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let finish_reason = match data["candidates"][0]["finishReason"].as_str() {
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("PROHIBITED_CONTENT") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content: non_empty(content, "gemini")?,
            finish_reason,
            usage: Usage {
                prompt_tokens: data["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0)
                    as usize,
                completion_tokens: data["usageMetadata"]["candidatesTokenCount"]
                    .as_u64()
                    .unwrap_or(0) as usize,
            },
            model: self.config.model.clone(),
        })
    }
}

// ============================================================================
// OpenAI Provider
// ============================================================================

pub struct OpenAIClient {
    client: Client,
    config: LLMConfig,
}

impl OpenAIClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let url = format!("{}/chat/completions", self.config.effective_base_url());

        let mut body = json!({
            "model": self.config.model,
            "messages": chat_messages(request),
        });
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        debug!(model = %self.config.model, temperature = ?request.temperature, "openai chat/completions");
        let data = send_json(
            self.client.post(&url).bearer_auth(&self.config.api_key),
            &body,
            self.config.timeout,
            &url,
        )
        .await?;

        chat_completion_response(&data, &self.config.model, "openai")
    }
}

// ============================================================================
// Anthropic Provider
// ============================================================================

pub struct AnthropicClient {
    client: Client,
    config: LLMConfig,
}

impl AnthropicClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let url = format!("{}/v1/messages", self.config.effective_base_url());

        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": DEFAULT_MAX_OUTPUT_TOKENS,
        });
        if let Some(sys) = request.system_text() {
            body["system"] = json!(sys);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        let version = self
            .config
            .api_version
            .as_deref()
            .unwrap_or(DEFAULT_ANTHROPIC_VERSION);

        debug!(model = %self.config.model, temperature = ?request.temperature, "anthropic messages");
        let data = send_json(
            self.client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", version),
            &body,
            self.config.timeout,
            &url,
        )
        .await?;

        let content = data["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"].as_str() == Some("text"))
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let finish_reason = match data["stop_reason"].as_str() {
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content: non_empty(content, "anthropic")?,
            finish_reason,
            usage: Usage {
                prompt_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
                completion_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
            },
            model: self.config.model.clone(),
        })
    }
}

// ============================================================================
// Local Provider (Ollama, vLLM, etc.)
// ============================================================================

pub struct LocalClient {
    client: Client,
    config: LLMConfig,
}

impl LocalClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        if config.base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(ConfigError::MissingCredential {
                provider: Provider::Local,
                var: LOCAL_LLM_URL_ENV.to_string(),
            });
        }
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        // Assume OpenAI-compatible API (works with vLLM, Ollama in OpenAI mode)
        let url = format!("{}/v1/chat/completions", self.config.effective_base_url());

        let mut body = json!({
            "model": self.config.model,
            "messages": chat_messages(request),
        });
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        debug!(model = %self.config.model, temperature = ?request.temperature, "local chat/completions");
        let mut builder = self.client.post(&url);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }
        let data = send_json(builder, &body, self.config.timeout, &url).await?;

        chat_completion_response(&data, &self.config.model, "local")
    }
}

// ============================================================================
// Unified Client
// ============================================================================

/// Unified LLM client that dispatches to the appropriate provider
pub enum UnifiedClient {
    Gemini(GeminiClient),
    OpenAI(OpenAIClient),
    Anthropic(AnthropicClient),
    Local(LocalClient),
}

impl UnifiedClient {
    /// Create from configuration
    pub fn from_config(config: LLMConfig) -> Result<Self, ConfigError> {
        Ok(match config.provider {
            Provider::Gemini => Self::Gemini(GeminiClient::new(config)?),
            Provider::OpenAI => Self::OpenAI(OpenAIClient::new(config)?),
            Provider::Anthropic => Self::Anthropic(AnthropicClient::new(config)?),
            Provider::Local => Self::Local(LocalClient::new(config)?),
        })
    }
}

#[async_trait]
impl LLMProvider for UnifiedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        match self {
            Self::Gemini(c) => c.complete(&request).await,
            Self::OpenAI(c) => c.complete(&request).await,
            Self::Anthropic(c) => c.complete(&request).await,
            Self::Local(c) => c.complete(&request).await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
