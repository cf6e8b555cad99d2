//! Token-arrival observers.
//!
//! Clients notify every observer in the list they were handed, once per
//! generated fragment. Observer order is not significant.

use futures::StreamExt;
use std::sync::Arc;
use tariff_core::AppResult;

use crate::client::LlmStream;

/// Observer invoked by a model client for every generated token or chunk.
pub trait LlmCallback: Send + Sync {
    fn on_llm_new_token(&self, token: &str);
}

/// Shared observer handle, as stored in observer lists.
pub type SharedCallback = Arc<dyn LlmCallback>;

/// Deliver one token notification to every observer.
pub fn notify_new_token(callbacks: &[SharedCallback], token: &str) {
    for callback in callbacks {
        callback.on_llm_new_token(token);
    }
}

/// Wrap a token stream so that each successful fragment is announced to the
/// observers as it passes through.
pub fn observe_stream(stream: LlmStream, callbacks: &[SharedCallback]) -> LlmStream {
    if callbacks.is_empty() {
        return stream;
    }

    let callbacks: Vec<SharedCallback> = callbacks.to_vec();
    Box::pin(stream.map(move |fragment: AppResult<String>| {
        if let Ok(token) = &fragment {
            notify_new_token(&callbacks, token);
        }
        fragment
    }))
}
