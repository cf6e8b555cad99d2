//! Ask command handler.
//!
//! Runs one search over the workspace context tables in the chosen execution
//! mode and prints the answer with its sources.

use clap::{Args, ValueEnum};
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tariff_core::{config::AppConfig, AppError, AppResult, FailurePolicy};
use tariff_llm::create_client_from_config;
use tariff_prompt::resolve_system_prompt;
use tariff_search::{
    ContextOptions, ContextRecords, ConversationHistory, SearchOrchestrator, SearchResult,
    SearchStreamEvent, TableContextBuilder,
};

/// How the search is executed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskMode {
    /// Block a worker thread until the answer is complete
    Blocking,
    /// Await the complete answer
    Async,
    /// Print tokens as they arrive
    Stream,
}

/// Ask a question about the loaded tariffs
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Execution mode
    #[arg(long, value_enum, default_value_t = AskMode::Blocking)]
    pub mode: AskMode,

    /// Response format hint, e.g. "single paragraph" or "bullet points"
    #[arg(short, long)]
    pub response_type: Option<String>,

    /// Prompt definition to use (from .tariff/prompts/)
    #[arg(long)]
    pub prompt_id: Option<String>,

    /// JSON file with prior conversation turns
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Context builder option as KEY=VALUE (repeatable)
    #[arg(long = "context-option", value_parser = parse_context_option)]
    pub context_options: Vec<(String, serde_json::Value)>,

    /// Maximum tokens in response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Temperature for response generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Ask the model for a JSON answer
    #[arg(long)]
    pub json_answer: bool,

    /// Failure policy (overrides the config file)
    #[arg(long, value_enum)]
    pub failure_policy: Option<FailurePolicy>,

    /// Output the search result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse `KEY=VALUE`; the value is read as JSON when it parses, else as a string.
fn parse_context_option(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty option name in '{}'", s));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Read conversation history from a JSON array of `{role, content}` turns.
fn load_history(path: &Path) -> AppResult<ConversationHistory> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read history file {:?}: {}", path, e))
    })?;
    let history: ConversationHistory = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded {} history turns from {:?}", history.len(), path);
    Ok(history)
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let config = self.apply_overrides(config);
        config.validate()?;

        let prompt_id = self
            .prompt_id
            .as_deref()
            .or(config.search.prompt_id.as_deref());
        let system_prompt = resolve_system_prompt(&config.workspace, prompt_id)?;
        tracing::debug!("Using system prompt from {:?}", system_prompt.source);

        let client = create_client_from_config(&config)?;
        let context_builder = Arc::new(TableContextBuilder::new(config.context_dir()));

        let mut orchestrator =
            SearchOrchestrator::from_config(client, context_builder, &config.search, &system_prompt);
        if let Some(response_type) = &self.response_type {
            orchestrator = orchestrator.with_response_type(response_type.clone());
        }

        let history = self.history.as_deref().map(load_history).transpose()?;
        let options: ContextOptions = self.context_options.iter().cloned().collect();

        match self.mode {
            AskMode::Blocking => {
                let orchestrator = Arc::new(orchestrator);
                let query = self.query.clone();
                // The model client drives the runtime handle from this thread.
                let result = tokio::task::spawn_blocking(move || {
                    orchestrator.search(&query, history.as_ref(), &options)
                })
                .await
                .map_err(|e| AppError::Other(format!("Search task failed: {}", e)))??;
                self.print_result(&result)
            }
            AskMode::Async => {
                let result = orchestrator
                    .asearch(&self.query, history.as_ref(), &options)
                    .await?;
                self.print_result(&result)
            }
            AskMode::Stream => {
                self.handle_streaming(&orchestrator, history.as_ref(), &options)
                    .await
            }
        }
    }

    /// Apply per-invocation flags on top of the `search` config section.
    fn apply_overrides(&self, config: &AppConfig) -> AppConfig {
        let mut config = config.clone();

        if let Some(max_tokens) = self.max_tokens {
            config.search.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.search.temperature = temperature;
        }
        if self.json_answer {
            config.search.json_mode = true;
        }
        if let Some(policy) = self.failure_policy {
            config.search.failure_policy = policy;
        }

        config
    }

    fn print_result(&self, result: &SearchResult) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(result)?);
            return Ok(());
        }

        if result.response().is_empty() {
            println!("No answer was generated. Check the logs for details.");
        } else {
            println!("{}", result.response());
        }
        print_sources(result.context_data());

        tracing::info!(
            "Completed in {:.2}s, {} prompt tokens, {} LLM call(s), first token after {}",
            result.completion_time(),
            result.prompt_tokens(),
            result.llm_calls(),
            format_latency(result.latency())
        );
        Ok(())
    }

    /// Handle streaming response.
    async fn handle_streaming(
        &self,
        orchestrator: &SearchOrchestrator,
        history: Option<&ConversationHistory>,
        options: &ContextOptions,
    ) -> AppResult<()> {
        tracing::info!("Starting streamed search");

        let mut stream = orchestrator.astream_search(&self.query, history, options);
        let mut stdout = std::io::stdout();

        while let Some(event) = stream.next().await {
            let event = event?;

            if self.json {
                // One event per line
                println!("{}", serde_json::to_string(&event)?);
                continue;
            }

            match event {
                SearchStreamEvent::Context(records) => {
                    print_sources(&records);
                    println!();
                }
                SearchStreamEvent::Token(token) => {
                    print!("{}", token);
                    stdout.flush().ok();
                }
                SearchStreamEvent::Completed { latency } => {
                    println!();
                    println!();
                    println!("Latency: {}", format_latency(latency));
                }
            }
        }

        Ok(())
    }
}

fn format_latency(latency: Option<f64>) -> String {
    latency
        .map(|l| format!("{:.2}s", l))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Print the `sources` records the answer was grounded on.
fn print_sources(records: &ContextRecords) {
    let Some(sources) = records.get("sources").filter(|s| !s.is_empty()) else {
        return;
    };

    println!();
    println!("Sources:");
    for (i, record) in sources.iter().enumerate() {
        println!("  {}", source_line(i, record));
    }
}

fn source_line(index: usize, record: &serde_json::Map<String, serde_json::Value>) -> String {
    let id = match record.get("id") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => (index + 1).to_string(),
    };
    let text = ["content", "text", "title"]
        .iter()
        .find_map(|key| record.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| serde_json::Value::Object(record.clone()).to_string());

    let mut line: String = text.replace('\n', " ");
    if line.chars().count() > 120 {
        line = line.chars().take(117).collect::<String>() + "...";
    }
    format!("[{}] {}", id, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_context_option() {
        assert_eq!(
            parse_context_option("max_records=10").unwrap(),
            ("max_records".to_string(), json!(10))
        );
        assert_eq!(
            parse_context_option("include_history=false").unwrap(),
            ("include_history".to_string(), json!(false))
        );
        assert_eq!(
            parse_context_option("mode=local").unwrap(),
            ("mode".to_string(), json!("local"))
        );
        assert!(parse_context_option("no-equals").is_err());
        assert!(parse_context_option("=5").is_err());
    }

    #[test]
    fn test_load_history() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");
        std::fs::write(
            &path,
            r#"[{"role":"user","content":"Liftgate fees?"},{"role":"assistant","content":"$75."}]"#,
        )
        .unwrap();

        let history = load_history(&path).unwrap();
        assert_eq!(history.len(), 2);

        assert!(load_history(&temp.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_source_line() {
        let record = json!({"id": 7, "content": "Carrier X charges $5/cwt"});
        assert_eq!(
            source_line(0, record.as_object().unwrap()),
            "[7] Carrier X charges $5/cwt"
        );

        let record = json!({"carrier": "Y"});
        assert_eq!(source_line(2, record.as_object().unwrap()), "[3] {\"carrier\":\"Y\"}");
    }

    /// Wraps the command the way `main` mounts it as a subcommand.
    #[derive(clap::Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        ask: AskCommand,
    }

    fn parse_ask(args: &[&str]) -> Result<AskCommand, clap::Error> {
        use clap::Parser;
        TestCli::try_parse_from(std::iter::once("ask").chain(args.iter().copied()))
            .map(|cli| cli.ask)
    }

    #[test]
    fn test_overrides_apply_flags() {
        let command = parse_ask(&[
            "fee?",
            "--mode",
            "async",
            "--max-tokens",
            "200",
            "--json-answer",
            "--failure-policy",
            "mask-all",
        ])
        .unwrap();
        assert_eq!(command.mode, AskMode::Async);

        let config = command.apply_overrides(&AppConfig::default());
        assert_eq!(config.search.max_tokens, 200);
        assert!(config.search.json_mode);
        assert_eq!(config.search.failure_policy, FailurePolicy::MaskAll);
    }

    #[test]
    fn test_failure_policy_flag_keeps_config_value_when_absent() {
        let mut base = AppConfig::default();
        base.search.failure_policy = FailurePolicy::PropagateAll;

        let command = parse_ask(&["fee?"]).unwrap();
        let config = command.apply_overrides(&base);
        assert_eq!(config.search.failure_policy, FailurePolicy::PropagateAll);
    }

    #[test]
    fn test_unknown_failure_policy_rejected_at_parse_time() {
        let err = parse_ask(&["fee?", "--failure-policy", "sometimes"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
        let rendered = err.to_string();
        assert!(rendered.contains("mask-generation"));
        assert!(rendered.contains("propagate-all"));
    }
}
