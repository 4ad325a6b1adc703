//! Candidate retrieval with graceful degradation.
//!
//! Tiers are tried in order and the first `Ok` wins, an empty list included.
//! Each tier states which earlier failure it is willing to recover from:
//!
//! ```text
//!   similarity search ──Reported──▶ unranked sample ──any──▶ emergency sample
//!          │                                                     ▲
//!          └──────────────────────Unavailable────────────────────┘
//! ```
//!
//! Only the similarity tier ranks and thresholds. The sample tiers stamp a
//! fixed similarity on every row so callers can tell degraded results apart.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use crate::config::AgentConfig;
use crate::models::SearchCandidate;
use crate::search::store::{EmbeddingStore, StoreError};

#[async_trait]
pub trait RetrievalTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this tier should run after the previous tier failed with `prior`.
    fn accepts(&self, prior: &StoreError) -> bool;

    async fn retrieve(&self, query_embedding: &[f32]) -> Result<Vec<SearchCandidate>, StoreError>;
}

/// Server-side similarity search: thresholded, ranked, capped.
pub struct SimilarityTier {
    store: Arc<dyn EmbeddingStore>,
    threshold: f32,
    limit: usize,
}

impl SimilarityTier {
    pub fn new(store: Arc<dyn EmbeddingStore>, threshold: f32, limit: usize) -> Self {
        Self {
            store,
            threshold,
            limit,
        }
    }
}

#[async_trait]
impl RetrievalTier for SimilarityTier {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn accepts(&self, _prior: &StoreError) -> bool {
        true
    }

    async fn retrieve(&self, query_embedding: &[f32]) -> Result<Vec<SearchCandidate>, StoreError> {
        self.store
            .match_embeddings(query_embedding, self.threshold, self.limit)
            .await
    }
}

/// Arbitrary rows with a fixed similarity. Runs only when the similarity
/// search answered with an error, not when it could not be reached.
pub struct UnrankedSampleTier {
    store: Arc<dyn EmbeddingStore>,
    limit: usize,
    similarity: f32,
}

impl UnrankedSampleTier {
    pub fn new(store: Arc<dyn EmbeddingStore>, limit: usize, similarity: f32) -> Self {
        Self {
            store,
            limit,
            similarity,
        }
    }
}

#[async_trait]
impl RetrievalTier for UnrankedSampleTier {
    fn name(&self) -> &'static str {
        "unranked_sample"
    }

    fn accepts(&self, prior: &StoreError) -> bool {
        prior.is_reported()
    }

    async fn retrieve(&self, _query_embedding: &[f32]) -> Result<Vec<SearchCandidate>, StoreError> {
        let rows = self.store.sample(self.limit).await?;
        Ok(rows
            .into_iter()
            .map(|r| r.into_candidate(self.similarity))
            .collect())
    }
}

/// Last resort: a small fixed batch after any failure.
pub struct EmergencySampleTier {
    store: Arc<dyn EmbeddingStore>,
    limit: usize,
    similarity: f32,
}

impl EmergencySampleTier {
    pub fn new(store: Arc<dyn EmbeddingStore>, limit: usize, similarity: f32) -> Self {
        Self {
            store,
            limit,
            similarity,
        }
    }
}

#[async_trait]
impl RetrievalTier for EmergencySampleTier {
    fn name(&self) -> &'static str {
        "emergency_sample"
    }

    fn accepts(&self, _prior: &StoreError) -> bool {
        true
    }

    async fn retrieve(&self, _query_embedding: &[f32]) -> Result<Vec<SearchCandidate>, StoreError> {
        let rows = self.store.sample(self.limit).await?;
        Ok(rows
            .into_iter()
            .map(|r| r.into_candidate(self.similarity))
            .collect())
    }
}

pub struct Retriever {
    store: Arc<dyn EmbeddingStore>,
    tiers: Vec<Box<dyn RetrievalTier>>,
    tier_timeout: Duration,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        tiers: Vec<Box<dyn RetrievalTier>>,
        tier_timeout: Duration,
    ) -> Self {
        Self {
            store,
            tiers,
            tier_timeout,
        }
    }

    /// The standard similarity → unranked → emergency chain.
    pub fn with_fallbacks(store: Arc<dyn EmbeddingStore>, config: &AgentConfig) -> Self {
        let tiers: Vec<Box<dyn RetrievalTier>> = vec![
            Box::new(SimilarityTier::new(
                store.clone(),
                config.match_threshold,
                config.match_count,
            )),
            Box::new(UnrankedSampleTier::new(
                store.clone(),
                config.match_count,
                config.unranked_similarity,
            )),
            Box::new(EmergencySampleTier::new(
                store.clone(),
                config.emergency_limit,
                config.emergency_similarity,
            )),
        ];
        Self::new(store, tiers, config.retrieval_timeout())
    }

    /// Never fails: exhausting every tier yields no candidates.
    pub async fn retrieve(&self, query_embedding: &[f32]) -> Vec<SearchCandidate> {
        self.spawn_count_log();

        let mut last_error: Option<StoreError> = None;

        for tier in &self.tiers {
            if let Some(prior) = &last_error {
                if !tier.accepts(prior) {
                    tracing::debug!(tier = tier.name(), "Tier skipped for this failure");
                    continue;
                }
            }

            let outcome = tokio::time::timeout(self.tier_timeout, tier.retrieve(query_embedding))
                .await
                .unwrap_or_else(|_| {
                    Err(StoreError::Unavailable(format!(
                        "{} timed out after {}s",
                        tier.name(),
                        self.tier_timeout.as_secs()
                    )))
                });

            match outcome {
                Ok(candidates) => {
                    tracing::info!(
                        tier = tier.name(),
                        candidates = candidates.len(),
                        "Retrieval finished"
                    );
                    return candidates;
                }
                Err(e) => {
                    tracing::warn!(tier = tier.name(), error = %e, "Retrieval tier failed");
                    last_error = Some(e);
                }
            }
        }

        tracing::warn!("All retrieval tiers failed, continuing with no candidates");
        Vec::new()
    }

    /// Log the store's row count without holding up the search.
    fn spawn_count_log(&self) {
        let store = self.store.clone();
        let timeout = self.tier_timeout;
        tokio::spawn(
            async move {
                match tokio::time::timeout(timeout, store.count()).await {
                    Ok(Ok(count)) => tracing::info!(count, "Embedding store row count"),
                    Ok(Err(e)) => tracing::warn!(error = %e, "Embedding store count failed"),
                    Err(_) => tracing::warn!("Embedding store count timed out"),
                }
            }
            .in_current_span(),
        );
    }
}
