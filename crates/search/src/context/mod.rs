//! Context builder boundary.
//!
//! A context builder turns a query into the evidence the model answers from:
//! a text rendering for the prompt and the raw records for citation display.
//! Retrieval and ranking live behind this trait, never in the orchestrator.

pub mod table;

use std::collections::BTreeMap;

use tariff_core::{AppError, AppResult};

use crate::history::ConversationHistory;

pub use table::TableContextBuilder;

/// One retrieved record (a table row).
pub type ContextRecord = serde_json::Map<String, serde_json::Value>;

/// Retrieved records keyed by category, e.g. `"sources"`.
pub type ContextRecords = BTreeMap<String, Vec<ContextRecord>>;

/// Free-form context-builder options.
pub type ContextOptions = serde_json::Map<String, serde_json::Value>;

/// Everything a context builder receives for one call.
#[derive(Debug, Clone, Copy)]
pub struct ContextRequest<'a> {
    pub query: &'a str,
    pub history: Option<&'a ConversationHistory>,
    pub response_type: &'a str,
    pub options: &'a ContextOptions,
}

/// Output of a context builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltContext {
    /// Context serialized for the system prompt
    pub text: String,
    /// The same context as records, passed through untouched
    pub records: ContextRecords,
}

/// Retrieves and formats evidence for a query.
#[async_trait::async_trait]
pub trait ContextBuilder: Send + Sync {
    fn build_context(&self, request: &ContextRequest<'_>) -> AppResult<BuiltContext>;

    /// Suspending variant; defaults to the blocking one.
    async fn abuild_context(&self, request: &ContextRequest<'_>) -> AppResult<BuiltContext> {
        self.build_context(request)
    }
}

/// Combine per-call options with the orchestrator's configured options.
///
/// A key supplied by both is rejected rather than silently overridden.
pub fn merge_options(call: &ContextOptions, configured: &ContextOptions) -> AppResult<ContextOptions> {
    let mut merged = call.clone();
    for (key, value) in configured {
        if merged.contains_key(key) {
            return Err(AppError::Context(format!(
                "Context builder option '{}' given both per call and in configuration",
                key
            )));
        }
        merged.insert(key.clone(), value.clone());
    }
    Ok(merged)
}

/// Flatten text into one `|`-separated table cell.
pub(crate) fn escape_cell(text: &str) -> String {
    text.replace(['\n', '\r'], " ").replace('|', "/")
}
