//! Answer composition: turns enriched search results plus the user's query
//! into an empathetic message, a few quick tips and a one-line summary.
//!
//! The model's reply must be a bare JSON object with exactly the three
//! expected keys. Anything else (a failed call, a timeout, prose around the
//! JSON, a missing key) yields [`fallback_answer`]. There is no retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use crate::llm::chat::LanguageModel;
use crate::llm::sanitize_for_prompt;
use crate::models::{ComposedAnswer, EnrichedResult};

const DESCRIPTION_CHARS: usize = 200;

const FALLBACK_EMPATHY: &str = "I understand you're looking for support with your wellness \
     journey. Based on your search, I found some options that may help.";
const FALLBACK_TIPS: [&str; 3] = [
    "Start with small, consistent changes",
    "Focus on natural, whole food sources when possible",
    "Consider consulting with a healthcare professional for personalized advice",
];
const FALLBACK_SUMMARY: &str =
    "Here are some wellness options that may help with what you're looking for.";

/// Fixed answer used whenever the model cannot produce a usable one.
pub fn fallback_answer() -> ComposedAnswer {
    ComposedAnswer {
        empathy_message: FALLBACK_EMPATHY.to_string(),
        quick_tips: FALLBACK_TIPS.iter().map(|t| t.to_string()).collect(),
        summary: FALLBACK_SUMMARY.to_string(),
    }
}

pub struct Composer {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    timeout: Duration,
}

impl Composer {
    pub fn new(model: Arc<dyn LanguageModel>, temperature: f32, timeout: Duration) -> Self {
        Self {
            model,
            temperature,
            timeout,
        }
    }

    /// Never fails: every error path degrades to [`fallback_answer`].
    pub async fn compose(&self, query: &str, results: &[EnrichedResult]) -> ComposedAnswer {
        let context = build_context(results);
        let system = build_system_prompt();
        let user = build_user_prompt(query, &context);

        let reply = match tokio::time::timeout(
            self.timeout,
            self.model.complete(&system, &user, self.temperature),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Answer composition call failed, using fallback");
                return fallback_answer();
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Answer composition timed out, using fallback"
                );
                return fallback_answer();
            }
        };

        match parse_composed_answer(&reply) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "Unusable composition output, using fallback");
                fallback_answer()
            }
        }
    }
}

/// Strict parse: the whole reply must be the JSON object, and every key must
/// be present with the right type.
fn parse_composed_answer(reply: &str) -> Result<ComposedAnswer> {
    let answer: ComposedAnswer = serde_json::from_str(reply.trim())?;
    if answer.quick_tips.is_empty() {
        anyhow::bail!("quickTips is empty");
    }
    Ok(answer)
}

fn build_system_prompt() -> String {
    String::from(
        "You are an empathetic wellness advisor. You help people find products, foods, \
         remedies and habits that support their health goals.\n\
         Be warm and supportive, never alarmist. Base suggestions on the provided \
         search results. Do not diagnose conditions.\n\
         Always respond with a single JSON object and nothing else.",
    )
}

fn build_user_prompt(query: &str, context: &str) -> String {
    let query = sanitize_for_prompt(query);
    format!(
        "User query: \"{query}\"\n\n\
         Relevant search results:\n{context}\n\n\
         Respond with ONLY a JSON object with exactly these keys:\n\
         - \"empathyMessage\": 2-3 sentences acknowledging the user's situation\n\
         - \"quickTips\": an array of 2-3 short, actionable tips\n\
         - \"summary\": one sentence summarizing how the results can help\n\
         No markdown, no explanation, just the JSON object."
    )
}

/// One line per result: `<CONTENT_TYPE>: <name-or-title> - <short description>`.
fn build_context(results: &[EnrichedResult]) -> String {
    results
        .iter()
        .map(format_context_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_context_line(result: &EnrichedResult) -> String {
    format!(
        "{}: {} - {}",
        result.candidate.content_type.to_uppercase(),
        sanitize_for_prompt(&display_name(result)),
        sanitize_for_prompt(&short_description(result)),
    )
}

fn display_name(result: &EnrichedResult) -> String {
    first_text(&result.details, &["name", "title"])
        .or_else(|| first_text(&result.candidate.metadata, &["name", "title"]))
        .unwrap_or_else(|| "Untitled".to_string())
}

fn short_description(result: &EnrichedResult) -> String {
    let text = first_text(
        &result.details,
        &["description", "summary", "content", "benefits"],
    )
    .or_else(|| first_text(&result.candidate.metadata, &["description", "summary"]))
    .unwrap_or_default();
    truncate_chars(&text, DESCRIPTION_CHARS)
}

fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| s.replace('\n', " "))
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchCandidate;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(msg.to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _system: &str, user: &str, temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!((temperature - 0.7).abs() < 1e-6);
            assert!(user.contains("User query:"));
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(anyhow::anyhow!(e.clone())),
            }
        }
    }

    struct StalledModel;

    #[async_trait]
    impl LanguageModel for StalledModel {
        async fn complete(&self, _system: &str, _user: &str, _t: f32) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    fn composer(model: Arc<dyn LanguageModel>) -> Composer {
        Composer::new(model, 0.7, Duration::from_secs(20))
    }

    fn result(content_type: &str, details: Value) -> EnrichedResult {
        EnrichedResult {
            candidate: SearchCandidate {
                id: "e".into(),
                content_type: content_type.into(),
                source_id: "s".into(),
                metadata: json!({ "name": "Meta name" }),
                similarity: 0.8,
            },
            details,
        }
    }

    #[tokio::test]
    async fn test_compose_returns_parsed_answer() {
        let model = ScriptedModel::ok(
            r#"{"empathyMessage":"Managing vitamin D levels can feel daunting.","quickTips":["Get morning sun","Eat fatty fish"],"summary":"These picks support vitamin D."}"#,
        );
        let answer = composer(model.clone()).compose("vitamin d deficiency", &[]).await;
        assert!(answer.empathy_message.contains("vitamin D"));
        assert_eq!(answer.quick_tips.len(), 2);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compose_non_json_falls_back() {
        let model = ScriptedModel::ok("I think you should drink more water.");
        let answer = composer(model).compose("hydration", &[]).await;
        assert_eq!(answer, fallback_answer());
    }

    #[tokio::test]
    async fn test_compose_leading_prose_falls_back() {
        let model = ScriptedModel::ok(
            r#"Sure! {"empathyMessage":"x","quickTips":["a","b"],"summary":"y"}"#,
        );
        let answer = composer(model).compose("sleep", &[]).await;
        assert_eq!(
            answer.quick_tips,
            vec![
                "Start with small, consistent changes",
                "Focus on natural, whole food sources when possible",
                "Consider consulting with a healthcare professional for personalized advice",
            ]
        );
    }

    #[tokio::test]
    async fn test_compose_missing_key_falls_back() {
        let model = ScriptedModel::ok(r#"{"empathyMessage":"x","summary":"y"}"#);
        let answer = composer(model).compose("sleep", &[]).await;
        assert_eq!(answer, fallback_answer());
    }

    #[tokio::test]
    async fn test_compose_call_failure_falls_back_without_retry() {
        let model = ScriptedModel::failing("429 rate limited");
        let answer = composer(model.clone()).compose("stress", &[]).await;
        assert_eq!(answer, fallback_answer());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compose_timeout_falls_back() {
        let composer = Composer::new(Arc::new(StalledModel), 0.7, Duration::from_secs(20));
        let answer = composer.compose("stress", &[]).await;
        assert_eq!(answer, fallback_answer());
    }

    #[test]
    fn test_parse_accepts_surrounding_whitespace() {
        let answer =
            parse_composed_answer("\n {\"empathyMessage\":\"a\",\"quickTips\":[\"b\"],\"summary\":\"c\"}\n")
                .unwrap();
        assert_eq!(answer.summary, "c");
    }

    #[test]
    fn test_parse_rejects_markdown_fence() {
        let reply = "```json\n{\"empathyMessage\":\"a\",\"quickTips\":[\"b\"],\"summary\":\"c\"}\n```";
        assert!(parse_composed_answer(reply).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_types_and_empty_tips() {
        assert!(parse_composed_answer(r#"{"empathyMessage":"a","quickTips":"b","summary":"c"}"#).is_err());
        assert!(parse_composed_answer(r#"{"empathyMessage":"a","quickTips":[],"summary":"c"}"#).is_err());
    }

    #[test]
    fn test_context_lines_in_order() {
        let results = vec![
            result("product", json!({ "name": "Vitamin D3 2000 IU", "description": "Daily softgel" })),
            result("wellness_tip", json!({ "title": "Morning sunlight", "content": "Ten minutes outside" })),
        ];
        let ctx = build_context(&results);
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "PRODUCT: Vitamin D3 2000 IU - Daily softgel");
        assert_eq!(lines[1], "WELLNESS_TIP: Morning sunlight - Ten minutes outside");
    }

    #[test]
    fn test_context_empty_without_results() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_context_falls_back_to_metadata_name() {
        let ctx = build_context(&[result("food", json!({}))]);
        assert_eq!(ctx, "FOOD: Meta name - ");
    }

    #[test]
    fn test_context_truncates_long_descriptions() {
        let long = "é".repeat(500);
        let ctx = build_context(&[result("remedy", json!({ "name": "Tea", "description": long }))]);
        let description = ctx.split(" - ").nth(1).unwrap();
        assert_eq!(description.chars().count(), DESCRIPTION_CHARS + 3);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn test_user_prompt_embeds_query_and_context() {
        let prompt = build_user_prompt("<|im_start|>vitamin d", "PRODUCT: D3 - softgel");
        assert!(prompt.contains("\"vitamin d\""));
        assert!(prompt.contains("PRODUCT: D3 - softgel"));
        assert!(prompt.contains("empathyMessage"));
        assert!(prompt.contains("quickTips"));
        assert!(!prompt.contains("<|im_start|>"));
    }

    #[test]
    fn test_system_prompt_sets_persona() {
        assert!(build_system_prompt().contains("empathetic wellness advisor"));
    }
}
