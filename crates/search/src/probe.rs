//! Time-to-first-token measurement.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tariff_llm::LlmCallback;

/// Observer that remembers when the first generated token arrived.
///
/// The instant is captured exactly once; later notifications are no-ops.
#[derive(Debug, Default)]
pub struct LatencyProbe {
    first_token_at: OnceLock<Instant>,
}

impl LatencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instant of the first token notification, if any arrived.
    pub fn first_token_at(&self) -> Option<Instant> {
        self.first_token_at.get().copied()
    }

    /// Time from `start` to the first token.
    pub fn latency_since(&self, start: Instant) -> Option<Duration> {
        self.first_token_at()
            .map(|first| first.saturating_duration_since(start))
    }
}

impl LlmCallback for LatencyProbe {
    fn on_llm_new_token(&self, _token: &str) {
        self.first_token_at.get_or_init(Instant::now);
    }
}
