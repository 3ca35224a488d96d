//! Anthropic, OpenAI, and Ollama/local `LlmClient` implementations, plus their wire formats.

use super::RETRY_DELAYS_MS;
use super::ollama::{detect_ollama, model_is_available, pull_ollama_model};
use anyhow::{Context, Result};
use rpg_core::llm::{LlmClient, Pricing, UsageSnapshot, UsageStats};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const OLLAMA_DEFAULT_MODEL: &str = "qwen2.5-coder:7b";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

async fn send_with_retry<F, Fut>(mut attempt: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String>>,
{
    let mut last_err = None;
    for delay_ms in RETRY_DELAYS_MS {
        match attempt().await {
            Ok(text) => return Ok(text),
            Err(err) => {
                tracing::warn!(error = %err, delay_ms, "LLM request failed, retrying");
                last_err = Some(err);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
    attempt().await.map_err(|err| last_err.unwrap_or(err))
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

/// `LlmClient` backed by Anthropic's Messages API.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
    usage: UsageStats,
}

impl AnthropicClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            http: reqwest::Client::new(),
            usage: UsageStats::new(),
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Reads `ANTHROPIC_API_KEY` (required) and `RPG_MODEL` (optional, defaults to
    /// `claude-sonnet-4-20250514`).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY not set")?;
        let model = std::env::var("RPG_MODEL").unwrap_or_else(|_| ANTHROPIC_DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model))
    }

    async fn send_once(&self, system: &str, prompt: &str) -> Result<String> {
        let req = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            messages: vec![Message { role: "user".to_string(), content: prompt.to_string() }],
        };

        let resp = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .context("failed to call Anthropic API")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API returned {status}: {text}");
        }

        let body: AnthropicResponse = resp.json().await.context("failed to parse Anthropic response")?;
        match &body.usage {
            Some(u) => self.usage.record(u.input_tokens, u.output_tokens),
            None => self.usage.record(0, 0),
        }
        body.content.first().map(|c| c.text.clone()).ok_or_else(|| anyhow::anyhow!("empty response from Anthropic"))
    }
}

impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        send_with_retry(|| self.send_once(system, prompt)).await
    }

    fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    fn estimate_cost(&self, usage: &UsageSnapshot) -> f64 {
        Pricing { prompt_usd_per_million: 3.0, completion_usd_per_million: 15.0 }.estimate(usage)
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// `LlmClient` backed by OpenAI's Chat Completions API.
pub struct OpenAiClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
    usage: UsageStats,
}

impl OpenAiClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            http: reqwest::Client::new(),
            usage: UsageStats::new(),
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Reads `OPENAI_API_KEY` (required) and `RPG_MODEL` (optional, defaults to `gpt-4o-mini`).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let model = std::env::var("RPG_MODEL").unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model))
    }

    async fn send_once(&self, system: &str, prompt: &str) -> Result<String> {
        let req = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                OpenAiMessage { role: "system".to_string(), content: system.to_string() },
                OpenAiMessage { role: "user".to_string(), content: prompt.to_string() },
            ],
            temperature: None,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .context("failed to call OpenAI API")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API returned {status}: {text}");
        }

        let body: OpenAiResponse = resp.json().await.context("failed to parse OpenAI response")?;
        match &body.usage {
            Some(u) => self.usage.record(u.prompt_tokens, u.completion_tokens),
            None => self.usage.record(0, 0),
        }
        body.choices.first().map(|c| c.message.content.clone()).ok_or_else(|| anyhow::anyhow!("empty response from OpenAI"))
    }
}

impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        send_with_retry(|| self.send_once(system, prompt)).await
    }

    fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    fn estimate_cost(&self, usage: &UsageSnapshot) -> f64 {
        Pricing { prompt_usd_per_million: 0.15, completion_usd_per_million: 0.60 }.estimate(usage)
    }
}

// ---------------------------------------------------------------------------
// Ollama / local OpenAI-compatible servers
// ---------------------------------------------------------------------------

/// `LlmClient` backed by Ollama's OpenAI-compatible `/v1/chat/completions` endpoint, or any other
/// local server speaking the same protocol. Free to run, so `estimate_cost` is always zero.
pub struct OllamaClient {
    base_url: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
    usage: UsageStats,
}

impl OllamaClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: 4096,
            http: reqwest::Client::new(),
            usage: UsageStats::new(),
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Probes `RPG_LOCAL_URL` (default `http://localhost:11434`) for a running Ollama instance
    /// and confirms the requested model (`RPG_MODEL`, default `qwen2.5-coder:7b`) is installed,
    /// pulling it first when `auto_pull` is set.
    pub async fn detect(auto_pull: bool) -> Result<Self> {
        let base_url = std::env::var("RPG_LOCAL_URL").unwrap_or_else(|_| OLLAMA_DEFAULT_URL.to_string());
        let model = std::env::var("RPG_MODEL").unwrap_or_else(|_| OLLAMA_DEFAULT_MODEL.to_string());

        let installed = detect_ollama(&base_url).await.context("Ollama is not reachable")?;
        if model_is_available(&installed, &model) {
            return Ok(Self::new(base_url, model));
        }
        if auto_pull {
            pull_ollama_model(&base_url, &model).await?;
            return Ok(Self::new(base_url, model));
        }
        anyhow::bail!("Ollama is running but model '{model}' is not installed. Run: ollama pull {model}")
    }

    async fn send_once(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        // Disables thinking mode on models that support it (qwen3 and similar), avoiding wasted
        // tokens on <think> blocks the caller would just strip anyway.
        let user_content = format!("{prompt} /no_think");
        let req = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                OpenAiMessage { role: "system".to_string(), content: system.to_string() },
                OpenAiMessage { role: "user".to_string(), content: user_content },
            ],
            temperature: Some(0.0),
        };

        let resp = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .with_context(|| format!("failed to call Ollama API at {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {text}");
        }

        let body: OpenAiResponse = resp.json().await.context("failed to parse Ollama response")?;
        match &body.usage {
            Some(u) => self.usage.record(u.prompt_tokens, u.completion_tokens),
            None => self.usage.record(0, 0),
        }
        body.choices.first().map(|c| c.message.content.clone()).ok_or_else(|| anyhow::anyhow!("empty response from Ollama"))
    }
}

impl LlmClient for OllamaClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        send_with_retry(|| self.send_once(system, prompt)).await
    }

    fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    fn estimate_cost(&self, _usage: &UsageSnapshot) -> f64 {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: String,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
