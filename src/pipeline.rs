//! Agent search orchestration: embed → retrieve → enrich → compose.
//!
//! Zero candidates short-circuit to a canned "no matches" answer without
//! touching the enricher or the composer. Only embedding failures escape as
//! errors; retrieval, enrichment and composition each degrade in place.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm::compose::Composer;
use crate::llm::embeddings::Embedder;
use crate::models::{AgentSearchResponse, ComposedAnswer};
use crate::search::enrich::Enricher;
use crate::search::retriever::Retriever;

const NO_MATCH_TIPS: [&str; 3] = [
    "Try using different or more general keywords",
    "Browse our products, foods and remedies by category",
    "Consider consulting with a healthcare professional for personalized advice",
];
const NO_MATCH_SUMMARY: &str =
    "No specific matches found in our wellness database. Try a different search term.";

const ERROR_MESSAGE: &str = "I'm sorry, I'm having trouble searching our wellness database \
     right now. Please try again in a moment.";
const ERROR_TIPS: [&str; 3] = [
    "Try your search again in a few moments",
    "Browse our categories directly to explore options",
    "Consider consulting with a healthcare professional for personalized advice",
];
const ERROR_SUMMARY: &str = "Search is temporarily unavailable.";
const ERROR_DETAIL: &str = "Failed to process search request";

pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    enricher: Enricher,
    composer: Composer,
    embed_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        enricher: Enricher,
        composer: Composer,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            retriever,
            enricher,
            composer,
            embed_timeout,
        }
    }

    /// Run one query through every stage. `query` must already be trimmed and non-empty.
    pub async fn run(&self, query: &str) -> Result<AgentSearchResponse> {
        let embedding = tokio::time::timeout(self.embed_timeout, self.embedder.embed(query))
            .await
            .context("Query embedding timed out")?
            .context("Query embedding failed")?;

        let candidates = self.retriever.retrieve(&embedding).await;
        if candidates.is_empty() {
            tracing::info!("No candidates, returning no-match answer");
            return Ok(no_match_response(query));
        }

        let results = self.enricher.enrich(candidates).await;
        let answer = self.composer.compose(query, &results).await;

        Ok(AgentSearchResponse::answered(answer, results))
    }
}

/// Canned answer for a search that retrieved nothing.
pub fn no_match_response(query: &str) -> AgentSearchResponse {
    AgentSearchResponse::answered(
        ComposedAnswer {
            empathy_message: format!(
                "I understand you're looking for help with \"{query}\". I couldn't find \
                 specific matches in our wellness database, but support is still available."
            ),
            quick_tips: NO_MATCH_TIPS.iter().map(|t| t.to_string()).collect(),
            summary: NO_MATCH_SUMMARY.to_string(),
        },
        Vec::new(),
    )
}

/// Canned answer for an unrecoverable failure. Same shape as a real answer.
pub fn error_response() -> AgentSearchResponse {
    AgentSearchResponse {
        empathy_message: ERROR_MESSAGE.to_string(),
        quick_tips: ERROR_TIPS.iter().map(|t| t.to_string()).collect(),
        summary: ERROR_SUMMARY.to_string(),
        search_results: Vec::new(),
        error: Some(ERROR_DETAIL.to_string()),
    }
}
