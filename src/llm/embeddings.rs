use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Turns a query into a dense vector comparable with the stored embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedder backed by the configured LLM provider's HTTP API.
///
/// No caching and no retries: every query is embedded afresh and a failure
/// goes straight back to the caller.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, text).await?,
            "openai" => embed_openai(&self.client, &self.config, text).await?,
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        };
        check_dimensions(embedding, self.config.embedding_dim)
    }
}

/// A vector of the wrong length came from a different model than the store's;
/// its similarity scores would be meaningless.
fn check_dimensions(embedding: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if embedding.len() != expected {
        anyhow::bail!(
            "Embedding has {} dimensions, store expects {expected}",
            embedding.len()
        );
    }
    Ok(embedding)
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(client: &reqwest::Client, config: &LlmConfig, text: &str) -> Result<Vec<f32>> {
    let url = format!("{}/api/embed", config.base_url);

    let req = OllamaEmbedRequest {
        model: &config.embedding_model,
        input: vec![text],
        truncate: true,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama embed API returned {status}: {body}");
    }

    let body: OllamaEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama embed response")?;

    body.embeddings
        .into_iter()
        .next()
        .context("No embedding returned")
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(client: &reqwest::Client, config: &LlmConfig, text: &str) -> Result<Vec<f32>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiEmbedRequest {
        model: &config.embedding_model,
        input: text,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI embed API returned {status}: {body}");
    }

    let body: OpenAiEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI embed response")?;

    body.data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .context("No embedding returned")
}
