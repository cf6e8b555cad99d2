//! Configuration management.
//!
//! Configuration is merged from, in increasing precedence:
//! - built-in defaults
//! - the workspace config file (`.tariff/config.yaml`)
//! - environment variables
//! - command-line flags
//!
//! The `search` section carries everything the search orchestrator needs
//! beyond its injected collaborators: response type, generation parameters,
//! failure policy and extra context-builder options.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".tariff";

/// Providers the client factory knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["ollama"];

/// Default response-type hint substituted into the system prompt.
pub const DEFAULT_RESPONSE_TYPE: &str = "multiple paragraphs";

/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .tariff/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider (e.g., "ollama")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Endpoint override for the active provider
    pub endpoint: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Search orchestration settings
    pub search: SearchConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub model: String,
    /// Request timeout in seconds
    pub timeout: Option<u64>,
}

/// What the orchestrator does with failures in its non-streaming modes.
///
/// Streaming calls always propagate, whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Context-build failures propagate, generation failures are masked
    /// into an empty-response result.
    #[default]
    MaskGeneration,
    /// Every failure propagates.
    PropagateAll,
    /// Context-build failures are masked too (empty context, empty response).
    MaskAll,
}

impl FailurePolicy {
    /// Whether prompt-format and model failures become degraded results.
    pub fn masks_generation(&self) -> bool {
        !matches!(self, Self::PropagateAll)
    }

    /// Whether context-build failures become degraded results.
    pub fn masks_context(&self) -> bool {
        matches!(self, Self::MaskAll)
    }
}

/// Search orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Hint describing the desired answer shape
    pub response_type: String,

    /// Workspace prompt to use instead of the built-in template
    pub prompt_id: Option<String>,

    pub max_tokens: u32,

    pub temperature: f32,

    /// Passed through to the model client; the orchestrator never enforces it
    pub timeout_secs: Option<u64>,

    /// Ask the model for JSON output
    pub json_mode: bool,

    pub failure_policy: FailurePolicy,

    /// Extra options forwarded to the context builder on every call
    pub context_builder_params: serde_json::Map<String, serde_json::Value>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            response_type: DEFAULT_RESPONSE_TYPE.to_string(),
            prompt_id: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            timeout_secs: None,
            json_mode: false,
            failure_policy: FailurePolicy::default(),
            context_builder_params: serde_json::Map::new(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    search: Option<SearchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and
    /// environment variables.
    ///
    /// Environment variables:
    /// - `TARIFF_WORKSPACE`: Override workspace path
    /// - `TARIFF_CONFIG`: Path to config file
    /// - `TARIFF_PROVIDER`: LLM provider
    /// - `TARIFF_MODEL`: Model identifier
    /// - `TARIFF_ENDPOINT`: Provider endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("TARIFF_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("TARIFF_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.state_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(provider) = std::env::var("TARIFF_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("TARIFF_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("TARIFF_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self;

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model.clone();
                result.endpoint = Some(provider_config.endpoint.clone());
            }

            result.llm = Some(llm);
        }

        if let Some(search) = config_file.search {
            result.search = search;
        }

        Ok(result)
    }

    /// Apply CLI overrides; flags take precedence over everything else.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        endpoint: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(endpoint) = endpoint {
            self.endpoint = Some(endpoint);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the `.tariff` state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Directory holding pre-built context tables.
    pub fn context_dir(&self) -> PathBuf {
        self.state_dir().join("context")
    }

    /// Directory holding workspace prompt definitions.
    pub fn prompts_dir(&self) -> PathBuf {
        self.state_dir().join("prompts")
    }

    /// Request timeout for the active provider: the search setting wins over
    /// the provider's own default.
    pub fn request_timeout(&self) -> Option<u64> {
        self.search.timeout_secs.or_else(|| {
            self.llm
                .as_ref()
                .and_then(|llm| llm.providers.get(&self.provider))
                .and_then(|p| p.timeout)
        })
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier cannot be empty".to_string()));
        }

        let temperature = self.search.temperature;
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(AppError::Config(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        if self.search.max_tokens == 0 {
            return Err(AppError::Config("maxTokens must be greater than zero".to_string()));
        }

        if self.search.response_type.trim().is_empty() {
            return Err(AppError::Config("responseType cannot be empty".to_string()));
        }

        Ok(())
    }
}
