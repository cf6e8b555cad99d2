//! Search result types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::ContextRecords;

/// Generated answer: plain text, or structured JSON when the model was asked
/// for JSON and returned a valid document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Text(String),
    Structured(serde_json::Value),
}

impl SearchResponse {
    pub fn empty() -> Self {
        SearchResponse::Text(String::new())
    }

    /// Interpret a raw model answer.
    pub fn from_answer(answer: String, json_mode: bool) -> Self {
        if json_mode {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&answer) {
                return SearchResponse::Structured(value);
            }
            tracing::debug!("JSON output requested but answer is not valid JSON; keeping text");
        }
        SearchResponse::Text(answer)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SearchResponse::Text(text) => text.is_empty(),
            SearchResponse::Structured(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SearchResponse::Text(text) => Some(text),
            SearchResponse::Structured(_) => None,
        }
    }
}

impl Default for SearchResponse {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for SearchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchResponse::Text(text) => f.write_str(text),
            SearchResponse::Structured(value) => write!(f, "{:#}", value),
        }
    }
}

/// Outcome of one orchestration call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    response: SearchResponse,
    context_data: ContextRecords,
    context_text: String,
    completion_time: f64,
    llm_calls: u32,
    prompt_tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latency: Option<f64>,
}

impl SearchResult {
    pub(crate) fn new(
        response: SearchResponse,
        context_data: ContextRecords,
        context_text: String,
        completion_time: Duration,
        prompt_tokens: usize,
        latency: Option<Duration>,
    ) -> Self {
        let completion_time = completion_time.as_secs_f64();
        Self {
            response,
            context_data,
            context_text,
            completion_time,
            llm_calls: 1,
            prompt_tokens,
            // latency <= completion_time must survive f64 rounding
            latency: latency.map(|l| l.as_secs_f64().min(completion_time)),
        }
    }

    pub fn response(&self) -> &SearchResponse {
        &self.response
    }

    /// Retrieved records keyed by category.
    pub fn context_data(&self) -> &ContextRecords {
        &self.context_data
    }

    pub fn context_text(&self) -> &str {
        &self.context_text
    }

    /// Seconds from call start to completion (or to the point of failure).
    pub fn completion_time(&self) -> f64 {
        self.completion_time
    }

    pub fn llm_calls(&self) -> u32 {
        self.llm_calls
    }

    pub fn prompt_tokens(&self) -> usize {
        self.prompt_tokens
    }

    /// Seconds from call start to the first generated token.
    pub fn latency(&self) -> Option<f64> {
        self.latency
    }
}

/// One item of a streamed search.
///
/// A stream always yields `Context` first, then zero or more `Token`s, then a
/// single `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SearchStreamEvent {
    Context(ContextRecords),
    Token(String),
    Completed { latency: Option<f64> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_from_answer() {
        let text = SearchResponse::from_answer("five dollars".to_string(), false);
        assert_eq!(text.as_text(), Some("five dollars"));

        let structured = SearchResponse::from_answer(r#"{"fee": 5}"#.to_string(), true);
        assert_eq!(structured, SearchResponse::Structured(json!({"fee": 5})));

        let fallback = SearchResponse::from_answer("not json".to_string(), true);
        assert_eq!(fallback.as_text(), Some("not json"));

        assert!(SearchResponse::empty().is_empty());
    }

    #[test]
    fn test_latency_never_exceeds_completion() {
        let result = SearchResult::new(
            SearchResponse::Text("ok".to_string()),
            ContextRecords::new(),
            String::new(),
            Duration::from_millis(10),
            3,
            Some(Duration::from_millis(11)),
        );
        assert_eq!(result.llm_calls(), 1);
        assert!(result.latency().unwrap() <= result.completion_time());
    }

    #[test]
    fn test_serialized_shape() {
        let result = SearchResult::new(
            SearchResponse::empty(),
            ContextRecords::new(),
            "ctx".to_string(),
            Duration::from_millis(5),
            0,
            None,
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["response"], json!(""));
        assert_eq!(value["llm_calls"], json!(1));
        assert!(value.get("latency").is_none());

        let event = serde_json::to_value(SearchStreamEvent::Token("A".to_string())).unwrap();
        assert_eq!(event, json!({"type": "token", "data": "A"}));
    }
}
