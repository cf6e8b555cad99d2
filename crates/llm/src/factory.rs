//! LLM provider factory.
//!
//! Builds a client for the configured provider so callers only ever hold an
//! `Arc<dyn LlmClient>`.

use crate::client::LlmClient;
use crate::providers::ollama::{OllamaClient, DEFAULT_BASE_URL};
use std::sync::Arc;
use std::time::Duration;
use tariff_core::{AppConfig, AppError, AppResult};

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `model` - Model every request is sent to
///
/// # Errors
/// Returns `AppError::Config` for unknown providers.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    model: &str,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or(DEFAULT_BASE_URL);
            tracing::debug!("Creating Ollama client at {} for model {}", base_url, model);
            Ok(Arc::new(OllamaClient::with_base_url(base_url, model)))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}

/// Create the client described by the merged application config.
pub fn create_client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = config.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
            let mut client = OllamaClient::with_base_url(base_url, &config.model);
            if let Some(timeout) = config.request_timeout() {
                client = client.with_default_timeout(Duration::from_secs(timeout));
            }
            Ok(Arc::new(client))
        }
        other => create_client(other, config.endpoint.as_deref(), &config.model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, "llama3.2").unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("Ollama", Some("http://localhost:8080"), "llama3.2");
        assert!(client.is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, "llama3.2") {
            Err(AppError::Config(msg)) => assert!(msg.contains("Unknown provider")),
            _ => panic!("Expected config error for unknown provider"),
        }
    }

    #[test]
    fn test_create_from_config() {
        let config = AppConfig::default();
        let client = create_client_from_config(&config).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }
}
