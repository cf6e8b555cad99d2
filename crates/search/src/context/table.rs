//! Context builder over pre-built tables on disk.
//!
//! Each `<category>.json` file under the context directory holds a JSON array
//! of records. Every category is returned as-is (no ranking), truncated to
//! `max_records`, and rendered as a pipe-delimited table.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tariff_core::{AppError, AppResult};
use walkdir::WalkDir;

use super::{escape_cell, BuiltContext, ContextBuilder, ContextOptions, ContextRecord, ContextRecords, ContextRequest};

const DEFAULT_MAX_RECORDS: usize = 50;
const DEFAULT_MAX_HISTORY_TURNS: usize = 10;

/// Reads `.tariff/context/*.json` tables.
#[derive(Debug, Clone)]
pub struct TableContextBuilder {
    context_dir: PathBuf,
}

/// Options understood by the table builder. Unknown keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableOptions {
    max_records: usize,
    include_history: bool,
    max_history_turns: usize,
}

impl TableOptions {
    fn from_map(options: &ContextOptions) -> AppResult<Self> {
        Ok(Self {
            max_records: usize_option(options, "max_records")?.unwrap_or(DEFAULT_MAX_RECORDS),
            include_history: bool_option(options, "include_history")?.unwrap_or(true),
            max_history_turns: usize_option(options, "max_history_turns")?
                .unwrap_or(DEFAULT_MAX_HISTORY_TURNS),
        })
    }
}

fn usize_option(options: &ContextOptions, key: &str) -> AppResult<Option<usize>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                AppError::Context(format!("Option '{}' must be a non-negative integer", key))
            }),
    }
}

fn bool_option(options: &ContextOptions, key: &str) -> AppResult<Option<bool>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| AppError::Context(format!("Option '{}' must be a boolean", key))),
    }
}

impl TableContextBuilder {
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        Self {
            context_dir: context_dir.into(),
        }
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    /// Load every category table, keyed by file stem.
    fn load_tables(&self) -> AppResult<ContextRecords> {
        if !self.context_dir.is_dir() {
            return Err(AppError::Context(format!(
                "Context directory not found: {:?}",
                self.context_dir
            )));
        }

        let mut tables = ContextRecords::new();
        for entry in WalkDir::new(&self.context_dir)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(category) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(path)?;
            let records: Vec<ContextRecord> = serde_json::from_str(&content).map_err(|e| {
                AppError::Context(format!("Invalid context table {:?}: {}", path, e))
            })?;
            tracing::debug!("Loaded {} {} records", records.len(), category);
            tables.insert(category.to_string(), records);
        }

        Ok(tables)
    }
}

impl ContextBuilder for TableContextBuilder {
    fn build_context(&self, request: &ContextRequest<'_>) -> AppResult<BuiltContext> {
        let options = TableOptions::from_map(request.options)?;

        let mut records = self.load_tables()?;
        for rows in records.values_mut() {
            rows.truncate(options.max_records);
        }

        let mut text = String::new();
        if options.include_history {
            if let Some(history) = request.history {
                let rendered = history.to_context_text(options.max_history_turns);
                if !rendered.is_empty() {
                    text.push_str(&rendered);
                    text.push('\n');
                }
            }
        }
        for (category, rows) in &records {
            text.push_str(&render_table(category, rows));
            text.push('\n');
        }

        Ok(BuiltContext {
            text: text.trim_end().to_string(),
            records,
        })
    }
}

/// Render one category as a `-----Category-----` headed pipe table.
fn render_table(category: &str, rows: &[ContextRecord]) -> String {
    let mut columns: BTreeSet<&str> = BTreeSet::new();
    for row in rows {
        columns.extend(row.keys().map(String::as_str));
    }
    let has_id = columns.remove("id");
    let columns: Vec<&str> = has_id.then_some("id").into_iter().chain(columns).collect();

    let mut out = format!("-----{}-----\n", title_case(category));
    out.push_str(&columns.join("|"));
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| row.get(*column).map(cell_text).unwrap_or_default())
            .collect();
        out.push_str(&cells.join("|"));
        out.push('\n');
    }
    out
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    escape_cell(&text)
}

fn title_case(category: &str) -> String {
    let mut chars = category.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ConversationHistory;
    use serde_json::json;
    use tariff_llm::ChatRole;
    use tempfile::TempDir;

    fn write_sources(dir: &Path) {
        std::fs::write(
            dir.join("sources.json"),
            json!([
                {"id": 1, "content": "Carrier X charges $5/cwt", "carrier": "X"},
                {"id": 2, "content": "Liftgate fee\n$75 per shipment", "carrier": "Y"},
                {"id": 3, "content": "Limited access | $90", "carrier": "Z"}
            ])
            .to_string(),
        )
        .unwrap();
    }

    fn request<'a>(
        options: &'a ContextOptions,
        history: Option<&'a ConversationHistory>,
    ) -> ContextRequest<'a> {
        ContextRequest {
            query: "What is carrier X's fee?",
            history,
            response_type: "multiple paragraphs",
            options,
        }
    }

    #[test]
    fn test_builds_sources_table() {
        let temp = TempDir::new().unwrap();
        write_sources(temp.path());
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let builder = TableContextBuilder::new(temp.path());
        let options = ContextOptions::new();
        let built = builder.build_context(&request(&options, None)).unwrap();

        assert_eq!(built.records.len(), 1);
        assert_eq!(built.records["sources"].len(), 3);
        assert!(built.text.starts_with("-----Sources-----\nid|carrier|content\n"));
        assert!(built.text.contains("1|X|Carrier X charges $5/cwt"));
        assert!(built.text.contains("2|Y|Liftgate fee $75 per shipment"));
        assert!(built.text.contains("3|Z|Limited access / $90"));
    }

    #[test]
    fn test_max_records_truncates_records_and_text() {
        let temp = TempDir::new().unwrap();
        write_sources(temp.path());

        let builder = TableContextBuilder::new(temp.path());
        let options = json!({"max_records": 1, "top_k": 60}).as_object().cloned().unwrap();
        let built = builder.build_context(&request(&options, None)).unwrap();

        assert_eq!(built.records["sources"].len(), 1);
        assert!(!built.text.contains("Liftgate"));
    }

    #[test]
    fn test_history_prefix_can_be_disabled() {
        let temp = TempDir::new().unwrap();
        write_sources(temp.path());
        let mut history = ConversationHistory::new();
        history.add_turn(ChatRole::User, "Earlier question");

        let builder = TableContextBuilder::new(temp.path());

        let with = ContextOptions::new();
        let built = builder.build_context(&request(&with, Some(&history))).unwrap();
        assert!(built.text.starts_with("-----Conversation History-----"));

        let without = json!({"include_history": false}).as_object().cloned().unwrap();
        let built = builder.build_context(&request(&without, Some(&history))).unwrap();
        assert!(built.text.starts_with("-----Sources-----"));
    }

    #[test]
    fn test_missing_directory_is_context_error() {
        let temp = TempDir::new().unwrap();
        let builder = TableContextBuilder::new(temp.path().join("absent"));
        let options = ContextOptions::new();
        let result = builder.build_context(&request(&options, None));
        assert!(matches!(result, Err(AppError::Context(_))));
    }

    #[test]
    fn test_malformed_table_and_bad_option() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("sources.json"), "{\"not\": \"an array\"}").unwrap();
        let builder = TableContextBuilder::new(temp.path());
        let options = ContextOptions::new();
        assert!(matches!(
            builder.build_context(&request(&options, None)),
            Err(AppError::Context(_))
        ));

        let bad = json!({"max_records": "many"}).as_object().cloned().unwrap();
        assert!(matches!(
            builder.build_context(&request(&bad, None)),
            Err(AppError::Context(ref msg)) if msg.contains("max_records")
        ));
    }
}
