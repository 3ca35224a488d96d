//! Concrete `EmbeddingClient` implementations: OpenAI's text-embedding API and Ollama's local
//! `/api/embed` endpoint. Both L2-normalize the vectors they return so cosine similarity reduces
//! to a plain dot product downstream.

use anyhow::{Context, Result};
use rpg_core::embedding::EmbeddingClient;
use serde::{Deserialize, Serialize};

const OPENAI_DEFAULT_MODEL: &str = "text-embedding-3-small";
const OPENAI_DEFAULT_DIMENSION: usize = 1536;
const OLLAMA_DEFAULT_MODEL: &str = "nomic-embed-text";
const OLLAMA_DEFAULT_DIMENSION: usize = 768;
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// `EmbeddingClient` backed by OpenAI's `/v1/embeddings` API.
pub struct OpenAiEmbeddingClient {
    api_key: String,
    model: String,
    dimension: usize,
    http: reqwest::Client,
}

impl OpenAiEmbeddingClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self { api_key: api_key.into(), model: model.into(), dimension, http: reqwest::Client::new() }
    }

    /// Reads `OPENAI_API_KEY` (required) and `RPG_EMBEDDING_MODEL` (optional, defaults to
    /// `text-embedding-3-small`, dimension 1536).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let model = std::env::var("RPG_EMBEDDING_MODEL").unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model, OPENAI_DEFAULT_DIMENSION))
    }
}

impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let req = OpenAiEmbeddingRequest { model: self.model.clone(), input: vec![text.to_string()] };
        let resp = self
            .http
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .context("failed to call OpenAI embeddings API")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embeddings API returned {status}: {text}");
        }

        let body: OpenAiEmbeddingResponse = resp.json().await.context("failed to parse OpenAI embeddings response")?;
        let mut embedding =
            body.data.into_iter().next().map(|d| d.embedding).ok_or_else(|| anyhow::anyhow!("empty embedding response from OpenAI"))?;
        normalize_l2(&mut embedding);
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = OpenAiEmbeddingRequest { model: self.model.clone(), input: texts.to_vec() };
        let resp = self
            .http
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .context("failed to call OpenAI embeddings API")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embeddings API returned {status}: {text}");
        }

        let body: OpenAiEmbeddingResponse = resp.json().await.context("failed to parse OpenAI embeddings response")?;
        let mut embeddings: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();
        if embeddings.len() != texts.len() {
            anyhow::bail!("embedding count mismatch: expected {}, got {}", texts.len(), embeddings.len());
        }
        for emb in &mut embeddings {
            normalize_l2(emb);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// `EmbeddingClient` backed by Ollama's local `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    base_url: String,
    model: String,
    dimension: usize,
    http: reqwest::Client,
}

impl OllamaEmbeddingClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self { base_url: base_url.into(), model: model.into(), dimension, http: reqwest::Client::new() }
    }

    /// Reads `RPG_LOCAL_URL` (default `http://localhost:11434`) and `RPG_EMBEDDING_MODEL`
    /// (default `nomic-embed-text`, dimension 768).
    pub fn from_env() -> Self {
        let base_url = std::env::var("RPG_LOCAL_URL").unwrap_or_else(|_| OLLAMA_DEFAULT_URL.to_string());
        let model = std::env::var("RPG_EMBEDDING_MODEL").unwrap_or_else(|_| OLLAMA_DEFAULT_MODEL.to_string());
        Self::new(base_url, model, OLLAMA_DEFAULT_DIMENSION)
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let req = OllamaEmbedRequest { model: self.model.clone(), input: texts.to_vec() };
        let resp = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .with_context(|| format!("failed to call Ollama embeddings API at {url}. Is Ollama running?"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama embed API returned {status}: {text}");
        }

        let body: OllamaEmbedResponse = resp.json().await.context("failed to parse Ollama embeddings response")?;
        let mut embeddings = body.embeddings;
        if embeddings.len() != texts.len() {
            anyhow::bail!("embedding count mismatch: expected {}, got {}", texts.len(), embeddings.len());
        }
        for emb in &mut embeddings {
            normalize_l2(emb);
        }
        Ok(embeddings)
    }
}

impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_many(std::slice::from_ref(&text.to_string())).await?;
        embeddings.pop().ok_or_else(|| anyhow::anyhow!("empty embedding response from Ollama"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_many(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_l2_scales_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_l2_leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn openai_client_reports_its_dimension() {
        let client = OpenAiEmbeddingClient::new("key", OPENAI_DEFAULT_MODEL, OPENAI_DEFAULT_DIMENSION);
        assert_eq!(client.dimension(), 1536);
    }

    #[test]
    fn ollama_client_reports_its_dimension() {
        let client = OllamaEmbeddingClient::new(OLLAMA_DEFAULT_URL, OLLAMA_DEFAULT_MODEL, OLLAMA_DEFAULT_DIMENSION);
        assert_eq!(client.dimension(), 768);
    }
}
