//! Model-client crate for the tariff RAG workspace.
//!
//! Provides a provider-agnostic abstraction over chat-style language models:
//! message exchanges, generation parameters, token-arrival observers and the
//! blocking / suspending / streaming entry points the search orchestrator
//! calls.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//!
//! # Example
//! ```no_run
//! use tariff_llm::{ChatMessage, LlmClient, LlmParams, OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new("llama3.2");
//! let messages = vec![ChatMessage::user("Hello, world!")];
//! let answer = client
//!     .agenerate(&messages, true, &[], &LlmParams::default())
//!     .await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use callback::{notify_new_token, observe_stream, LlmCallback, SharedCallback};
pub use client::{block_on_async, collect_stream, LlmClient, LlmStream};
pub use factory::{create_client, create_client_from_config};
pub use providers::OllamaClient;
pub use types::{ChatMessage, ChatRole, LlmParams};
