//! Model client abstraction.
//!
//! This module defines the capability surface the search orchestrator relies
//! on. A client sends a message exchange to a text-generation backend and
//! either returns the complete answer or streams it fragment by fragment,
//! notifying the observers it is handed for every fragment.

use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use tariff_core::{AppError, AppResult};
use tokio::runtime::RuntimeFlavor;

use crate::callback::SharedCallback;
use crate::types::{ChatMessage, LlmParams};

/// Stream of generated token fragments.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// Trait for model providers.
///
/// Observers passed in `callbacks` must each receive a notification for every
/// emitted fragment whenever the client streams internally.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama").
    fn provider_name(&self) -> &str;

    /// Blocking generation on the caller's thread.
    fn generate(
        &self,
        messages: &[ChatMessage],
        streaming: bool,
        callbacks: &[SharedCallback],
        params: &LlmParams,
    ) -> AppResult<String>;

    /// Suspending generation.
    ///
    /// With `streaming` set the backend is asked to stream, so observers see
    /// the first fragment as early as possible; the aggregated answer is
    /// still what gets returned.
    async fn agenerate(
        &self,
        messages: &[ChatMessage],
        streaming: bool,
        callbacks: &[SharedCallback],
        params: &LlmParams,
    ) -> AppResult<String>;

    /// Lazily stream generated fragments.
    async fn astream_generate(
        &self,
        messages: &[ChatMessage],
        callbacks: &[SharedCallback],
        params: &LlmParams,
    ) -> AppResult<LlmStream>;
}

/// Drain a fragment stream into the full answer, stopping at the first error.
pub async fn collect_stream(mut stream: LlmStream) -> AppResult<String> {
    let mut answer = String::new();
    while let Some(fragment) = stream.next().await {
        answer.push_str(&fragment?);
    }
    Ok(answer)
}

/// Drive an async client call to completion from synchronous code.
///
/// Without an ambient tokio runtime a private current-thread runtime is
/// started for the call. Inside a multi-thread runtime the ambient handle is
/// reused through `block_in_place`. A current-thread runtime cannot be
/// blocked from its own thread, so that case is an `Llm` error rather than a
/// panic.
pub fn block_on_async<F: Future>(future: F) -> AppResult<F::Output> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(|| handle.block_on(future)))
            }
            flavor => Err(AppError::Llm(format!(
                "Blocking generation is not possible on a {:?} tokio runtime; \
                 use the async API or spawn_blocking",
                flavor
            ))),
        },
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| AppError::Llm(format!("Failed to start runtime: {}", e)))?;
            Ok(runtime.block_on(future))
        }
    }
}
