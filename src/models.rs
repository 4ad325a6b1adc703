use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Closed set of catalog content kinds that can appear in the embedding store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Product,
    Food,
    Remedy,
    SupplementGuide,
    WellnessTip,
}

impl ContentType {
    /// Parse the wire tag. Anything outside the closed set is `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "product" => Some(Self::Product),
            "food" => Some(Self::Food),
            "remedy" => Some(Self::Remedy),
            "supplement_guide" => Some(Self::SupplementGuide),
            "wellness_tip" => Some(Self::WellnessTip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Food => "food",
            Self::Remedy => "remedy",
            Self::SupplementGuide => "supplement_guide",
            Self::WellnessTip => "wellness_tip",
        }
    }

    /// Authoritative table owning the full record.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Food => "foods",
            Self::Remedy => "remedies",
            Self::SupplementGuide => "supplementation_guides",
            Self::WellnessTip => "wellness_tips",
        }
    }

    /// PostgREST `select` pulling the row plus its classification relation.
    pub fn select(&self) -> &'static str {
        match self {
            Self::Product => "*,brands(name),categories(name)",
            Self::Food => "*,food_categories(name)",
            Self::Remedy => "*,remedy_categories(name)",
            Self::SupplementGuide | Self::WellnessTip => "*",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row keys come back as text (uuid) or as numbers (bigserial). Both are kept
/// as opaque strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric key, got {other}"
        ))),
    }
}

/// A row of the embeddings table as exported by the population job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub embedding: Vec<f32>,
    pub content_type: String,
    #[serde(deserialize_with = "string_or_number")]
    pub source_id: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A retrieved reference into one of the catalog tables.
///
/// `content_type` stays a raw string: rows with tags outside [`ContentType`]
/// still make it out of the store and are dropped during enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCandidate {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub content_type: String,
    #[serde(deserialize_with = "string_or_number")]
    pub source_id: String,
    #[serde(default)]
    pub metadata: Value,
    pub similarity: f32,
}

/// A candidate with its authoritative catalog row attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedResult {
    #[serde(flatten)]
    pub candidate: SearchCandidate,
    pub details: Value,
}

/// The model-authored part of an agent answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComposedAnswer {
    pub empathy_message: String,
    pub quick_tips: Vec<String>,
    pub summary: String,
}

/// Agent search response body. Identical shape for answered, no-match and
/// failure paths; only failures carry `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSearchResponse {
    pub empathy_message: String,
    pub quick_tips: Vec<String>,
    pub summary: String,
    pub search_results: Vec<EnrichedResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentSearchResponse {
    pub fn answered(answer: ComposedAnswer, search_results: Vec<EnrichedResult>) -> Self {
        Self {
            empathy_message: answer.empathy_message,
            quick_tips: answer.quick_tips,
            summary: answer.summary,
            search_results,
            error: None,
        }
    }
}

/// Body of a rejected request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

/// Health response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub embeddings: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parse_round_trips_every_tag() {
        for ct in [
            ContentType::Product,
            ContentType::Food,
            ContentType::Remedy,
            ContentType::SupplementGuide,
            ContentType::WellnessTip,
        ] {
            assert_eq!(ContentType::parse(ct.as_str()), Some(ct));
        }
    }

    #[test]
    fn test_content_type_rejects_unknown_tag() {
        assert_eq!(ContentType::parse("recipe"), None);
        assert_eq!(ContentType::parse("Product"), None);
        assert_eq!(ContentType::parse(""), None);
    }

    #[test]
    fn test_content_type_tables() {
        assert_eq!(ContentType::SupplementGuide.table(), "supplementation_guides");
        assert_eq!(
            ContentType::Product.select(),
            "*,brands(name),categories(name)"
        );
        assert_eq!(ContentType::WellnessTip.select(), "*");
    }

    #[test]
    fn test_candidate_accepts_numeric_keys() {
        let body = r#"[{"id":1,"content_type":"food","source_id":42,"metadata":{},"similarity":0.73}]"#;
        let rows: Vec<SearchCandidate> = serde_json::from_str(body).unwrap();
        assert_eq!(rows[0].id, "1");
        assert_eq!(rows[0].source_id, "42");
    }

    #[test]
    fn test_candidate_rejects_non_scalar_key() {
        let body = r#"{"id":{"x":1},"content_type":"food","source_id":"f1","similarity":0.5}"#;
        assert!(serde_json::from_str::<SearchCandidate>(body).is_err());
    }

    #[test]
    fn test_enriched_result_flattens_candidate_fields() {
        let result = EnrichedResult {
            candidate: SearchCandidate {
                id: "e1".into(),
                content_type: "food".into(),
                source_id: "f1".into(),
                metadata: serde_json::json!({ "name": "Salmon" }),
                similarity: 0.75,
            },
            details: serde_json::json!({ "id": "f1" }),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content_type"], "food");
        assert_eq!(json["source_id"], "f1");
        assert_eq!(json["details"]["id"], "f1");
        assert!(json.get("candidate").is_none());
    }

    #[test]
    fn test_response_uses_camel_case_and_omits_absent_error() {
        let resp = AgentSearchResponse::answered(
            ComposedAnswer {
                empathy_message: "m".into(),
                quick_tips: vec!["t".into()],
                summary: "s".into(),
            },
            Vec::new(),
        );
        let json = serde_json::to_value(&resp).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["empathyMessage", "quickTips", "searchResults", "summary"]);
    }
}
