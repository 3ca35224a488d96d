//! The LLM client contract (§6.2): a small async trait implemented by each concrete provider in
//! `rpg-encoder`, plus usage accounting and a deterministic null client for tests.

use anyhow::Result;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token usage and call counters accumulated across a client's lifetime.
#[derive(Debug, Default)]
pub struct UsageStats {
    pub prompt_tokens: AtomicU64,
    pub completion_tokens: AtomicU64,
    pub calls: AtomicU64,
}

impl UsageStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens
            .fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(completion_tokens, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            calls: self.calls.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`UsageStats`], cheap to pass around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub calls: u64,
}

/// Per-million-token pricing used by [`LlmClient::estimate_cost`] implementations.
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub prompt_usd_per_million: f64,
    pub completion_usd_per_million: f64,
}

impl Pricing {
    #[must_use]
    pub fn estimate(&self, usage: &UsageSnapshot) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let prompt_cost =
            usage.prompt_tokens as f64 / 1_000_000.0 * self.prompt_usd_per_million;
        #[allow(clippy::cast_precision_loss)]
        let completion_cost =
            usage.completion_tokens as f64 / 1_000_000.0 * self.completion_usd_per_million;
        prompt_cost + completion_cost
    }
}

/// Shared contract for chat-completion LLM providers used by semantic extraction, structural
/// reorganization, and semantic routing.
///
/// Implementations are expected to retry transient failures internally (the per-batch retry
/// budget lives in `EncodingConfig::max_parse_iterations`, applied by the caller); `complete`
/// itself should return a single attempt's outcome so callers can control retry policy.
pub trait LlmClient: Send + Sync {
    /// Issue a single completion request and return the raw text response.
    fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Issue a completion request and parse the response as JSON of type `T`. The default
    /// implementation strips `<think>` blocks and markdown code fences before parsing, mirroring
    /// how the underlying models format structured output.
    fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<T>> + Send
    where
        Self: Sized,
    {
        async move {
            let raw = self.complete(system, prompt).await?;
            parse_json_response(&raw)
        }
    }

    /// Cumulative usage for this client instance.
    fn usage(&self) -> UsageSnapshot;

    /// Estimated USD cost of `usage`, per this client's pricing.
    fn estimate_cost(&self, usage: &UsageSnapshot) -> f64;
}

/// Strips `<think>...</think>` blocks some reasoning models emit before their answer.
#[must_use]
pub fn strip_think_blocks(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end_offset) = result[start..].find("</think>") {
            let end = start + end_offset + "</think>".len();
            result = format!("{}{}", &result[..start], &result[end..]);
        } else {
            result.truncate(start);
            break;
        }
    }
    result
}

/// Extracts a JSON payload from free-form LLM text: strips think blocks, then looks for a
/// `<solution>` tag, a fenced ```json block, a bare fence, or a literal JSON value, in that
/// order.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    let text = strip_think_blocks(text);
    let text = text.as_str();

    let json_str = if let Some(start) = text.find("<solution>") {
        let after = &text[start + "<solution>".len()..];
        after
            .find("</solution>")
            .map_or(text.trim(), |end| after[..end].trim())
    } else {
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            trimmed
        } else if let Some(start) = text.find("```json") {
            let after = &text[start + "```json".len()..];
            after.find("```").map_or(trimmed, |end| after[..end].trim())
        } else if let Some(start) = text.find("```") {
            let after = &text[start + "```".len()..];
            after.find("```").map_or(trimmed, |end| after[..end].trim())
        } else {
            trimmed
        }
    };

    serde_json::from_str(json_str)
        .map_err(|e| anyhow::anyhow!("failed to parse LLM JSON response: {e}"))
}

/// A deterministic, offline `LlmClient` for tests. Never makes network calls; `complete` returns
/// canned responses keyed by call order, falling back to the last response once exhausted.
pub struct NullLlmClient {
    responses: Vec<String>,
    calls: std::sync::atomic::AtomicUsize,
    usage: UsageStats,
}

impl NullLlmClient {
    #[must_use]
    pub fn new(responses: Vec<String>) -> Self {
        NullLlmClient {
            responses,
            calls: std::sync::atomic::AtomicUsize::new(0),
            usage: UsageStats::new(),
        }
    }

    #[must_use]
    pub fn single(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }
}

impl LlmClient for NullLlmClient {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        let idx = self.calls.fetch_add(1, Ordering::Relaxed);
        self.usage.record(0, 0);
        let response = self
            .responses
            .get(idx)
            .or_else(|| self.responses.last())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NullLlmClient has no canned responses"))?;
        Ok(response)
    }

    fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    fn estimate_cost(&self, _usage: &UsageSnapshot) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_blocks() {
        let text = "<think>reasoning here</think>{\"a\":1}";
        assert_eq!(strip_think_blocks(text), "{\"a\":1}");
    }

    #[test]
    fn parses_json_from_solution_tags() {
        #[derive(serde::Deserialize)]
        struct Out {
            a: i32,
        }
        let text = "blah <solution>{\"a\": 42}</solution> blah";
        let out: Out = parse_json_response(text).unwrap();
        assert_eq!(out.a, 42);
    }

    #[test]
    fn parses_json_from_fenced_block() {
        #[derive(serde::Deserialize)]
        struct Out {
            a: i32,
        }
        let text = "```json\n{\"a\": 7}\n```";
        let out: Out = parse_json_response(text).unwrap();
        assert_eq!(out.a, 7);
    }

    #[tokio::test]
    async fn null_client_cycles_through_responses() {
        let client = NullLlmClient::new(vec!["first".into(), "second".into()]);
        assert_eq!(client.complete("sys", "p").await.unwrap(), "first");
        assert_eq!(client.complete("sys", "p").await.unwrap(), "second");
        assert_eq!(client.complete("sys", "p").await.unwrap(), "second");
        assert_eq!(client.usage().calls, 3);
    }
}
