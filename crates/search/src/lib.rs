//! Retrieval-augmented question answering over LTL rules tariffs.
//!
//! The [`SearchOrchestrator`] ties a [`ContextBuilder`] and a model client
//! together: it fetches context, formats the system prompt, calls the model
//! with a [`LatencyProbe`] attached and reports timing and token metadata in
//! a [`SearchResult`].
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use tariff_llm::OllamaClient;
//! use tariff_search::{ContextOptions, SearchOrchestrator, TableContextBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = SearchOrchestrator::new(
//!     Arc::new(OllamaClient::new("llama3.2")),
//!     Arc::new(TableContextBuilder::new(".tariff/context")),
//! );
//! let result = orchestrator
//!     .asearch("What is the liftgate fee?", None, &ContextOptions::new())
//!     .await?;
//! println!("{}", result.response());
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod history;
pub mod orchestrator;
pub mod probe;
pub mod result;
pub mod tokens;

// Re-export main types
pub use context::{
    merge_options, BuiltContext, ContextBuilder, ContextOptions, ContextRecord, ContextRecords,
    ContextRequest, TableContextBuilder,
};
pub use history::{ConversationHistory, ConversationTurn};
pub use orchestrator::{ExecutionMode, SearchOrchestrator, SearchStream};
pub use probe::LatencyProbe;
pub use result::{SearchResponse, SearchResult, SearchStreamEvent};
pub use tokens::{num_tokens, TokenEncoder, WordPieceEncoder};
