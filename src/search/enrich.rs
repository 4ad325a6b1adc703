use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::models::{ContentType, EnrichedResult, SearchCandidate};
use crate::search::store::CatalogSource;

/// Resolves candidates into full catalog rows.
///
/// Failures are per item: a candidate whose lookup errors, finds nothing, or
/// whose content type is unknown is logged and dropped. Survivors keep their
/// input order.
pub struct Enricher {
    catalog: Arc<dyn CatalogSource>,
    concurrency: usize,
}

impl Enricher {
    pub fn new(catalog: Arc<dyn CatalogSource>, concurrency: usize) -> Self {
        Self {
            catalog,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn enrich(&self, candidates: Vec<SearchCandidate>) -> Vec<EnrichedResult> {
        let total = candidates.len();

        // `buffered` yields in input order regardless of completion order
        let enriched: Vec<EnrichedResult> = stream::iter(candidates)
            .map(|candidate| self.enrich_one(candidate))
            .buffered(self.concurrency)
            .filter_map(|r| async move { r })
            .collect()
            .await;

        tracing::info!(
            candidates = total,
            enriched = enriched.len(),
            dropped = total - enriched.len(),
            "Enrichment finished"
        );
        enriched
    }

    async fn enrich_one(&self, candidate: SearchCandidate) -> Option<EnrichedResult> {
        let Some(content_type) = ContentType::parse(&candidate.content_type) else {
            tracing::warn!(
                content_type = %candidate.content_type,
                source_id = %candidate.source_id,
                "Unknown content type, dropping candidate"
            );
            return None;
        };

        match self
            .catalog
            .fetch_details(content_type, &candidate.source_id)
            .await
        {
            Ok(Some(details)) => Some(EnrichedResult { candidate, details }),
            Ok(None) => {
                tracing::warn!(
                    content_type = %content_type,
                    source_id = %candidate.source_id,
                    "Source row not found, dropping candidate"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    content_type = %content_type,
                    source_id = %candidate.source_id,
                    error = %e,
                    "Detail fetch failed, dropping candidate"
                );
                None
            }
        }
    }
}
