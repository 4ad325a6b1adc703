use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::models::{ContentType, EmbeddingRecord, SearchCandidate};
use crate::search::store::{CatalogSource, EmbeddingStore, StoreError, StoredRef};

/// On-disk export of the embeddings table, optionally with the catalog rows
/// it points at (keyed by content type, then source id).
#[derive(Debug, Default, Deserialize)]
pub struct EmbeddingsExport {
    pub embeddings: Vec<EmbeddingRecord>,
    #[serde(default)]
    pub details: HashMap<ContentType, HashMap<String, Value>>,
}

impl EmbeddingsExport {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read embeddings export {}", path.display()))?;
        serde_json::from_str(&data).context("Failed to parse embeddings export")
    }
}

/// In-memory embedding store with cosine similarity search.
///
/// Read-only after construction. Rows whose vector length differs from the
/// store's dimensionality are skipped at load time.
pub struct MemoryEmbeddingStore {
    records: Vec<EmbeddingRecord>,
    dimensions: usize,
}

impl MemoryEmbeddingStore {
    pub fn new(records: Vec<EmbeddingRecord>, dimensions: usize) -> Self {
        let total = records.len();
        let records: Vec<EmbeddingRecord> = records
            .into_iter()
            .filter(|r| r.embedding.len() == dimensions)
            .collect();
        if records.len() < total {
            tracing::warn!(
                skipped = total - records.len(),
                dimensions,
                "Skipped embeddings with mismatched dimensions"
            );
        }
        Self {
            records,
            dimensions,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows at or above `threshold`, best first. Ties keep load order.
    pub fn search(&self, query_embedding: &[f32], threshold: f32, limit: usize) -> Vec<SearchCandidate> {
        let mut scored: Vec<(f32, &EmbeddingRecord)> = self
            .records
            .iter()
            .map(|r| (cosine_similarity(query_embedding, &r.embedding), r))
            .filter(|(score, _)| *score >= threshold)
            .collect();

        // Stable sort, descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(similarity, r)| SearchCandidate {
                id: r.id.clone(),
                content_type: r.content_type.clone(),
                source_id: r.source_id.clone(),
                metadata: r.metadata.clone(),
                similarity,
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingStore for MemoryEmbeddingStore {
    async fn match_embeddings(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, StoreError> {
        if query_embedding.len() != self.dimensions {
            return Err(StoreError::Reported {
                status: 400,
                message: format!(
                    "query embedding has {} dimensions, expected {}",
                    query_embedding.len(),
                    self.dimensions
                ),
            });
        }
        Ok(self.search(query_embedding, threshold, limit))
    }

    async fn sample(&self, limit: usize) -> Result<Vec<StoredRef>, StoreError> {
        Ok(self
            .records
            .iter()
            .take(limit)
            .map(|r| StoredRef {
                id: r.id.clone(),
                content_type: r.content_type.clone(),
                source_id: r.source_id.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}

/// Catalog rows held in memory, keyed by content type and source id.
pub struct MemoryCatalog {
    rows: HashMap<ContentType, HashMap<String, Value>>,
}

impl MemoryCatalog {
    pub fn new(rows: HashMap<ContentType, HashMap<String, Value>>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn fetch_details(
        &self,
        content_type: ContentType,
        source_id: &str,
    ) -> Result<Option<Value>> {
        Ok(self
            .rows
            .get(&content_type)
            .and_then(|rows| rows.get(source_id))
            .cloned())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
