use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{string_or_number, ContentType, SearchCandidate};

/// Failure talking to the embedding store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered, but with a structured error (bad RPC, missing function, ...).
    #[error("Store reported an error ({status}): {message}")]
    Reported { status: u16, message: String },

    /// The call itself failed: transport error, timeout, undecodable body.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_reported(&self) -> bool {
        matches!(self, StoreError::Reported { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// A row of the embedding store without its vector.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StoredRef {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub content_type: String,
    #[serde(deserialize_with = "string_or_number")]
    pub source_id: String,
    #[serde(default)]
    pub metadata: Value,
}

impl StoredRef {
    /// Unranked rows carry a fixed similarity so consumers always see the field.
    pub fn into_candidate(self, similarity: f32) -> SearchCandidate {
        SearchCandidate {
            id: self.id,
            content_type: self.content_type,
            source_id: self.source_id,
            metadata: self.metadata,
            similarity,
        }
    }
}

/// Read-only access to precomputed embeddings.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Rows with similarity >= `threshold`, best first, at most `limit`.
    async fn match_embeddings(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, StoreError>;

    /// Up to `limit` arbitrary rows, no similarity computed.
    async fn sample(&self, limit: usize) -> Result<Vec<StoredRef>, StoreError>;

    /// Number of stored rows. May be an estimate.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Authoritative catalog records behind each content type.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// The full row with its classification relation, or `None` when the
    /// source row no longer exists.
    async fn fetch_details(
        &self,
        content_type: ContentType,
        source_id: &str,
    ) -> anyhow::Result<Option<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_ref_accepts_numeric_keys() {
        let rows: Vec<StoredRef> = serde_json::from_str(
            r#"[{"id":7,"content_type":"remedy","source_id":"r1"},{"id":"e8","content_type":"food","source_id":19}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].id, "7");
        assert_eq!(rows[1].source_id, "19");
        let candidate = rows[0].clone().into_candidate(0.8);
        assert_eq!(candidate.id, "7");
    }
}
