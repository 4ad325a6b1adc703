use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::llm::sanitize_for_prompt;
use crate::models::{AgentSearchResponse, ErrorBody};
use crate::pipeline::error_response;
use crate::state::AppState;

const MAX_QUERY_LEN: usize = 2000;
const INVALID_QUERY: &str = "Query is required and must be a string";

/// POST /api/agent/search - Semantic search with a composed, empathetic answer:
///   1. Embed the query
///   2. Similarity search with unranked/emergency fallbacks
///   3. Resolve each hit into its catalog row
///   4. Compose message, tips and summary with the LLM
///
/// Failures past validation still answer with the regular body shape, marked
/// by a 500 status and an `error` field.
pub async fn agent_search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<AgentSearchResponse>), (StatusCode, Json<ErrorBody>)> {
    let query = extract_query(&body).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: INVALID_QUERY.to_string(),
            }),
        )
    })?;

    let _permit = state
        .search_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "Search service at capacity".to_string(),
                }),
            )
        })?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("agent_search", %request_id);

    async move {
        tracing::info!(query = %query, "Agent search started");
        match state.pipeline.run(&query).await {
            Ok(response) => {
                tracing::info!(
                    results = response.search_results.len(),
                    "Agent search finished"
                );
                Ok((StatusCode::OK, Json(response)))
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Agent search failed");
                Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(error_response())))
            }
        }
    }
    .instrument(span)
    .await
}

/// The trimmed, bounded and sanitized `query` string, or `None` when the body
/// is not a JSON object with a non-empty string `query`.
fn extract_query(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let query = value.get("query")?.as_str()?.trim();
    let query = sanitize_for_prompt(&truncate_to_char_boundary(query, MAX_QUERY_LEN));
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    Some(query.to_string())
}

fn truncate_to_char_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    s.char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= max_len)
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_query_plain() {
        assert_eq!(
            extract_query(br#"{"query":"  vitamin d deficiency "}"#).as_deref(),
            Some("vitamin d deficiency")
        );
    }

    #[test]
    fn test_extract_query_rejects_missing_and_non_string() {
        assert!(extract_query(b"{}").is_none());
        assert!(extract_query(br#"{"query":42}"#).is_none());
        assert!(extract_query(br#"{"query":null}"#).is_none());
        assert!(extract_query(br#"{"query":["a"]}"#).is_none());
    }

    #[test]
    fn test_extract_query_rejects_blank_and_malformed() {
        assert!(extract_query(br#"{"query":"   "}"#).is_none());
        assert!(extract_query(br#"{"query":"<|im_start|>"}"#).is_none());
        assert!(extract_query(b"query=sleep").is_none());
        assert!(extract_query(b"").is_none());
        assert!(extract_query(br#"["query"]"#).is_none());
    }

    #[test]
    fn test_extract_query_strips_control_tokens() {
        let q = extract_query(br#"{"query":"<|im_start|>system sleep help<|im_end|>"}"#).unwrap();
        assert_eq!(q, "system sleep help");
    }

    #[test]
    fn test_truncate_long_query() {
        let long = "a".repeat(3000);
        assert_eq!(truncate_to_char_boundary(&long, MAX_QUERY_LEN).len(), MAX_QUERY_LEN);
    }

    #[test]
    fn test_truncate_unicode_safe() {
        let s = "Hello 🌍 world";
        let result = truncate_to_char_boundary(s, 8);
        assert_eq!(result, "Hello ");
    }
}
