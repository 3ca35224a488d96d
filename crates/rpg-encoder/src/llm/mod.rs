//! Concrete `LlmClient` implementations: Anthropic, OpenAI, and Ollama (or any other
//! OpenAI-compatible local server). Each retries transient failures internally with a fixed
//! backoff schedule before `complete` returns, per `rpg_core::llm::LlmClient`'s contract.

mod ollama;
mod providers;

pub use providers::{AnthropicClient, OllamaClient, OpenAiClient};

/// Backoff delays between retries of a failed completion request, in milliseconds.
pub(crate) const RETRY_DELAYS_MS: [u64; 3] = [500, 2000, 4000];
