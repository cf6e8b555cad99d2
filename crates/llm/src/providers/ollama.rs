//! Ollama LLM provider implementation.
//!
//! Speaks the chat endpoint of Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::callback::{notify_new_token, observe_stream, SharedCallback};
use crate::client::{block_on_async, collect_stream, LlmClient, LlmStream};
use crate::types::{ChatMessage, LlmParams};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tariff_core::{AppError, AppResult};

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama `/api/chat` request body.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: serde_json::Map<String, serde_json::Value>,
}

/// One response object; streamed responses send one per line.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// Model every request is sent to
    model: String,

    /// Fallback timeout when the generation params carry none
    default_timeout: Option<Duration>,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for `model` on the default local endpoint.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, model)
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            default_timeout: None,
            client: reqwest::Client::new(),
        }
    }

    /// Timeout applied when the generation params do not set one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn to_chat_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        stream: bool,
        params: &LlmParams,
    ) -> OllamaChatRequest<'a> {
        let mut options = params.extra.clone();
        options.insert("temperature".to_string(), serde_json::json!(params.temperature));
        options.insert("num_predict".to_string(), serde_json::json!(params.max_tokens));

        OllamaChatRequest {
            model: &self.model,
            messages,
            stream,
            format: params.json_mode.then_some("json"),
            options,
        }
    }

    fn timeout_for(&self, params: &LlmParams) -> Option<Duration> {
        params
            .timeout_secs
            .map(Duration::from_secs)
            .or(self.default_timeout)
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        stream: bool,
        params: &LlmParams,
    ) -> AppResult<reqwest::Response> {
        let body = self.to_chat_request(messages, stream, params);
        let mut request = self.client.post(self.chat_url()).json(&body);
        if let Some(timeout) = self.timeout_for(params) {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        params: &LlmParams,
    ) -> AppResult<String> {
        let response = self.send(messages, false, params).await?;

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(AppError::Llm(format!("Ollama error: {}", error)));
        }

        tracing::debug!(
            prompt_eval_count = ?body.prompt_eval_count,
            eval_count = ?body.eval_count,
            "Received completion from Ollama"
        );

        Ok(body.message.map(|m| m.content).unwrap_or_default())
    }
}

/// Split every complete line out of `buffer`, leaving a trailing partial
/// line in place for the next network chunk.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line).trim().to_string();
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines
}

/// Feed one network chunk into the line buffer and parse every complete
/// line. `None` signals end of body: whatever is left is parsed as the last
/// line.
fn next_fragments(buffer: &mut Vec<u8>, chunk: Option<&[u8]>) -> Vec<AppResult<String>> {
    let lines = match chunk {
        Some(bytes) => {
            buffer.extend_from_slice(bytes);
            drain_lines(buffer)
        }
        None => {
            let tail = String::from_utf8_lossy(buffer).trim().to_string();
            buffer.clear();
            if tail.is_empty() {
                Vec::new()
            } else {
                vec![tail]
            }
        }
    };

    lines
        .iter()
        .filter_map(|line| parse_chunk_line(line).transpose())
        .collect()
}

/// Parse one NDJSON line into its content fragment. Empty fragments (such as
/// the final `done` object) yield `None`.
fn parse_chunk_line(line: &str) -> AppResult<Option<String>> {
    let chunk: OllamaChatResponse = serde_json::from_str(line)
        .map_err(|e| AppError::Llm(format!("Failed to parse chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(AppError::Llm(format!("Ollama error: {}", error)));
    }

    if chunk.done {
        tracing::debug!(
            prompt_eval_count = ?chunk.prompt_eval_count,
            eval_count = ?chunk.eval_count,
            "Ollama stream finished"
        );
    }

    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty()))
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn generate(
        &self,
        messages: &[ChatMessage],
        streaming: bool,
        callbacks: &[SharedCallback],
        params: &LlmParams,
    ) -> AppResult<String> {
        block_on_async(self.agenerate(messages, streaming, callbacks, params))?
    }

    async fn agenerate(
        &self,
        messages: &[ChatMessage],
        streaming: bool,
        callbacks: &[SharedCallback],
        params: &LlmParams,
    ) -> AppResult<String> {
        tracing::info!(model = %self.model, streaming, "Sending chat request to Ollama");

        if streaming {
            let stream = self.astream_generate(messages, callbacks, params).await?;
            return collect_stream(stream).await;
        }

        let answer = self.complete_once(messages, params).await?;
        if !answer.is_empty() {
            notify_new_token(callbacks, &answer);
        }
        Ok(answer)
    }

    async fn astream_generate(
        &self,
        messages: &[ChatMessage],
        callbacks: &[SharedCallback],
        params: &LlmParams,
    ) -> AppResult<LlmStream> {
        tracing::debug!(model = %self.model, "Starting streaming chat request to Ollama");

        let response = self.send(messages, true, params).await?;

        // A trailing `None` marks end of body so an unterminated last line
        // is still parsed.
        let fragments = response
            .bytes_stream()
            .map(Some)
            .chain(futures::stream::once(futures::future::ready(None)))
            .scan(Vec::new(), |buffer, chunk| {
                let items: Vec<AppResult<String>> = match chunk {
                    Some(Ok(bytes)) => next_fragments(buffer, Some(&bytes[..])),
                    Some(Err(e)) => vec![Err(AppError::Llm(format!("Stream error: {}", e)))],
                    None => next_fragments(buffer, None),
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();

        Ok(observe_stream(Box::pin(fragments), callbacks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::with_base_url("http://localhost:11434/", "llama3.2");
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(client.model(), "llama3.2");
    }

    #[test]
    fn test_chat_request_conversion() {
        let client = OllamaClient::new("llama3.2");
        let messages = vec![
            ChatMessage::system("Data tables here"),
            ChatMessage::user("What is carrier X's fee?"),
        ];
        let mut params = LlmParams::default().with_json_mode();
        params
            .extra
            .insert("top_p".to_string(), serde_json::json!(0.8));

        let request = client.to_chat_request(&messages, true, &params);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "llama3.2");
        assert_eq!(value["stream"], true);
        assert_eq!(value["format"], "json");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "What is carrier X's fee?");
        assert_eq!(value["options"]["num_predict"], 1500);
        assert_eq!(value["options"]["top_p"], 0.8);
    }

    #[test]
    fn test_timeout_prefers_params() {
        let client = OllamaClient::new("llama3.2").with_default_timeout(Duration::from_secs(30));
        assert_eq!(
            client.timeout_for(&LlmParams::default()),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            client.timeout_for(&LlmParams::default().with_timeout_secs(5)),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_drain_lines_keeps_partial_tail() {
        let mut buffer = b"{\"a\":1}\n{\"b\":".to_vec();
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines, vec!["{\"a\":1}".to_string()]);
        assert_eq!(buffer, b"{\"b\":".to_vec());
    }

    #[test]
    fn test_unterminated_last_line_is_parsed_at_end() {
        let mut buffer = Vec::new();
        let first = next_fragments(
            &mut buffer,
            Some(&b"{\"message\":{\"role\":\"assistant\",\"content\":\"Saia\"}}\n{\"error\":\"boom\"}"[..]),
        );
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].as_deref().unwrap(), "Saia");

        let last = next_fragments(&mut buffer, None);
        assert_eq!(last.len(), 1);
        assert!(matches!(&last[0], Err(AppError::Llm(msg)) if msg.contains("boom")));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unterminated_content_line_is_not_dropped() {
        let mut buffer = Vec::new();
        assert!(next_fragments(
            &mut buffer,
            Some(&b"{\"message\":{\"role\":\"assistant\",\"content\":\" $75\"}}"[..]),
        )
        .is_empty());

        let last = next_fragments(&mut buffer, None);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].as_deref().unwrap(), " $75");

        assert!(next_fragments(&mut Vec::new(), None).is_empty());
    }

    #[test]
    fn test_parse_chunk_line() {
        let token = parse_chunk_line(
            r#"{"model":"llama3.2","message":{"role":"assistant","content":"Car"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(token.as_deref(), Some("Car"));

        let done = parse_chunk_line(
            r#"{"model":"llama3.2","message":{"role":"assistant","content":""},"done":true,"eval_count":12}"#,
        )
        .unwrap();
        assert!(done.is_none());

        assert!(parse_chunk_line(r#"{"error":"model not found"}"#).is_err());
        assert!(parse_chunk_line("not json").is_err());
    }
}
