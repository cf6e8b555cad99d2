//! Search orchestration.
//!
//! One logical operation, three ways to run it:
//! - [`SearchOrchestrator::search`] blocks the calling thread
//! - [`SearchOrchestrator::asearch`] suspends at the context build and the model call
//! - [`SearchOrchestrator::astream_search`] yields context records, then tokens, then latency
//!
//! Blocking and awaitable calls share one internal procedure, so prompt
//! assembly and timing cannot drift between them.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use tracing::Instrument;

use tariff_core::{AppResult, FailurePolicy, SearchConfig};
use tariff_llm::{ChatMessage, LlmClient, LlmParams, LlmStream, SharedCallback};
use tariff_prompt::{format_system_prompt, SystemPrompt, DEFAULT_SYSTEM_PROMPT};

use crate::context::{
    merge_options, BuiltContext, ContextBuilder, ContextOptions, ContextRecords, ContextRequest,
};
use crate::history::ConversationHistory;
use crate::probe::LatencyProbe;
use crate::result::{SearchResponse, SearchResult, SearchStreamEvent};
use crate::tokens::{num_tokens, TokenEncoder, WordPieceEncoder};

/// Response-type hint used when none is configured.
pub const DEFAULT_RESPONSE_TYPE: &str = tariff_core::config::DEFAULT_RESPONSE_TYPE;

/// Lazy sequence produced by a streamed search.
pub type SearchStream<'a> = Pin<Box<dyn Stream<Item = AppResult<SearchStreamEvent>> + Send + 'a>>;

/// How a search call is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Blocking,
    Awaitable,
    Streamed,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Blocking => "blocking",
            ExecutionMode::Awaitable => "awaitable",
            ExecutionMode::Streamed => "streamed",
        }
    }
}

/// Progress of a streamed search between polls.
enum StreamState {
    Start,
    Generate {
        start: Instant,
        context_text: String,
    },
    Tokens {
        start: Instant,
        tokens: LlmStream,
        probe: Arc<LatencyProbe>,
    },
    Done,
}

/// Answers questions over retrieved tariff context.
///
/// The model client and context builder are injected and shared across
/// calls. Each call owns its own latency probe and prompt string, so one
/// orchestrator can serve concurrent calls without locking.
pub struct SearchOrchestrator {
    llm: Arc<dyn LlmClient>,
    context_builder: Arc<dyn ContextBuilder>,
    token_encoder: Arc<dyn TokenEncoder>,
    system_prompt: String,
    response_type: String,
    callbacks: Vec<SharedCallback>,
    llm_params: LlmParams,
    context_builder_params: ContextOptions,
    failure_policy: FailurePolicy,
}

impl SearchOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, context_builder: Arc<dyn ContextBuilder>) -> Self {
        Self {
            llm,
            context_builder,
            token_encoder: Arc::new(WordPieceEncoder),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            response_type: DEFAULT_RESPONSE_TYPE.to_string(),
            callbacks: Vec::new(),
            llm_params: LlmParams::default(),
            context_builder_params: ContextOptions::new(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Build an orchestrator from the `search` config section and a resolved
    /// system prompt. A response type carried by the prompt definition wins
    /// over the configured one.
    pub fn from_config(
        llm: Arc<dyn LlmClient>,
        context_builder: Arc<dyn ContextBuilder>,
        config: &SearchConfig,
        system_prompt: &SystemPrompt,
    ) -> Self {
        let response_type = system_prompt
            .response_type
            .clone()
            .unwrap_or_else(|| config.response_type.clone());

        Self::new(llm, context_builder)
            .with_system_prompt(system_prompt.template.clone())
            .with_response_type(response_type)
            .with_llm_params(LlmParams::from(config))
            .with_context_builder_params(config.context_builder_params.clone())
            .with_failure_policy(config.failure_policy)
    }

    pub fn with_token_encoder(mut self, encoder: Arc<dyn TokenEncoder>) -> Self {
        self.token_encoder = encoder;
        self
    }

    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = response_type.into();
        self
    }

    /// Observers notified of every generated token, alongside the latency probe.
    pub fn with_callbacks(mut self, callbacks: Vec<SharedCallback>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_llm_params(mut self, params: LlmParams) -> Self {
        self.llm_params = params;
        self
    }

    /// Options forwarded to the context builder on every call.
    pub fn with_context_builder_params(mut self, params: ContextOptions) -> Self {
        self.context_builder_params = params;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    pub fn llm_params(&self) -> &LlmParams {
        &self.llm_params
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Blocking search on the caller's thread.
    ///
    /// Safe to call from inside a tokio runtime: model clients that need the
    /// runtime either borrow a multi-thread worker or fail with a generation
    /// error, which the failure policy then masks or propagates.
    pub fn search(
        &self,
        query: &str,
        history: Option<&ConversationHistory>,
        options: &ContextOptions,
    ) -> AppResult<SearchResult> {
        let span = search_span(ExecutionMode::Blocking);
        futures::executor::block_on(
            self.execute(ExecutionMode::Blocking, query, history, options)
                .instrument(span),
        )
    }

    /// Awaitable search; returns the aggregated answer.
    pub async fn asearch(
        &self,
        query: &str,
        history: Option<&ConversationHistory>,
        options: &ContextOptions,
    ) -> AppResult<SearchResult> {
        let span = search_span(ExecutionMode::Awaitable);
        self.execute(ExecutionMode::Awaitable, query, history, options)
            .instrument(span)
            .await
    }

    /// Streamed search.
    ///
    /// Yields the context records first, then each generated fragment, then a
    /// final [`SearchStreamEvent::Completed`] with the time to first token.
    /// Nothing is masked here: any failure is yielded as an error item and
    /// ends the stream.
    pub fn astream_search<'a>(
        &'a self,
        query: &'a str,
        history: Option<&'a ConversationHistory>,
        options: &'a ContextOptions,
    ) -> SearchStream<'a> {
        let span = search_span(ExecutionMode::Streamed);

        let stream = futures::stream::unfold(StreamState::Start, move |state| {
            let span = span.clone();
            async move {
                match state {
                    StreamState::Start => {
                        let start = Instant::now();
                        tracing::info!("Generating answer for query: {}", query);

                        match self
                            .build_context(ExecutionMode::Streamed, query, history, options)
                            .await
                        {
                            Ok(context) => Some((
                                Ok(SearchStreamEvent::Context(context.records)),
                                StreamState::Generate {
                                    start,
                                    context_text: context.text,
                                },
                            )),
                            Err(e) => Some((Err(e), StreamState::Done)),
                        }
                    }
                    StreamState::Generate {
                        start,
                        context_text,
                    } => {
                        let probe = Arc::new(LatencyProbe::new());
                        let opened = match self.format_prompt(&context_text) {
                            Ok(prompt) => self.open_stream(query, &prompt, &probe).await,
                            Err(e) => Err(e),
                        };
                        match opened {
                            Ok(tokens) => next_stream_item(start, tokens, probe).await,
                            Err(e) => Some((Err(e), StreamState::Done)),
                        }
                    }
                    StreamState::Tokens {
                        start,
                        tokens,
                        probe,
                    } => next_stream_item(start, tokens, probe).await,
                    StreamState::Done => None,
                }
            }
            .instrument(span)
        });

        Box::pin(stream)
    }

    /// The search procedure shared by blocking and awaitable calls.
    async fn execute(
        &self,
        mode: ExecutionMode,
        query: &str,
        history: Option<&ConversationHistory>,
        options: &ContextOptions,
    ) -> AppResult<SearchResult> {
        let start = Instant::now();
        tracing::info!("Generating answer for query: {}", query);

        let context = match self.build_context(mode, query, history, options).await {
            Ok(context) => context,
            Err(e) if self.failure_policy.masks_context() => {
                tracing::error!(error = %e, "Context build failed; returning empty result");
                return Ok(SearchResult::new(
                    SearchResponse::empty(),
                    ContextRecords::new(),
                    String::new(),
                    start.elapsed(),
                    0,
                    None,
                ));
            }
            Err(e) => return Err(e),
        };

        let probe = Arc::new(LatencyProbe::new());
        let (prompt, answer) = match self.format_prompt(&context.text) {
            Ok(prompt) => {
                let answer = self.invoke(mode, query, &prompt, &probe).await;
                (prompt, answer)
            }
            Err(e) => (String::new(), Err(e)),
        };
        let prompt_tokens = num_tokens(&prompt, self.token_encoder.as_ref());

        match answer {
            Ok(answer) => {
                let latency = probe.latency_since(start);
                let result = SearchResult::new(
                    SearchResponse::from_answer(answer, self.llm_params.json_mode),
                    context.records,
                    context.text,
                    start.elapsed(),
                    prompt_tokens,
                    latency,
                );
                tracing::info!(
                    "Answer generated in {:.2}s ({} prompt tokens, first token after {:?}s)",
                    result.completion_time(),
                    result.prompt_tokens(),
                    result.latency()
                );
                Ok(result)
            }
            Err(e) if self.failure_policy.masks_generation() => {
                tracing::error!(error = ?e, "Answer generation failed; returning empty response");
                Ok(SearchResult::new(
                    SearchResponse::empty(),
                    context.records,
                    context.text,
                    start.elapsed(),
                    prompt_tokens,
                    None,
                ))
            }
            Err(e) => Err(e),
        }
    }

    async fn build_context(
        &self,
        mode: ExecutionMode,
        query: &str,
        history: Option<&ConversationHistory>,
        options: &ContextOptions,
    ) -> AppResult<BuiltContext> {
        let options = merge_options(options, &self.context_builder_params)?;
        let request = ContextRequest {
            query,
            history,
            response_type: &self.response_type,
            options: &options,
        };

        match mode {
            ExecutionMode::Blocking => self.context_builder.build_context(&request),
            ExecutionMode::Awaitable | ExecutionMode::Streamed => {
                self.context_builder.abuild_context(&request).await
            }
        }
    }

    fn format_prompt(&self, context_text: &str) -> AppResult<String> {
        format_system_prompt(&self.system_prompt, context_text, &self.response_type)
    }

    /// The probe first, then caller-supplied observers.
    fn observers(&self, probe: &Arc<LatencyProbe>) -> Vec<SharedCallback> {
        let probe: SharedCallback = probe.clone();
        let mut observers = Vec::with_capacity(self.callbacks.len() + 1);
        observers.push(probe);
        observers.extend(self.callbacks.iter().cloned());
        observers
    }

    fn messages(query: &str, prompt: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::system(prompt), ChatMessage::user(query)]
    }

    async fn invoke(
        &self,
        mode: ExecutionMode,
        query: &str,
        prompt: &str,
        probe: &Arc<LatencyProbe>,
    ) -> AppResult<String> {
        let messages = Self::messages(query, prompt);
        let observers = self.observers(probe);
        tracing::debug!(
            "Calling {} with {} messages (max_tokens={}, temperature={})",
            self.llm.provider_name(),
            messages.len(),
            self.llm_params.max_tokens,
            self.llm_params.temperature
        );

        // Streaming is always requested so the probe sees the first token.
        match mode {
            ExecutionMode::Blocking => {
                self.llm
                    .generate(&messages, true, &observers, &self.llm_params)
            }
            ExecutionMode::Awaitable | ExecutionMode::Streamed => {
                self.llm
                    .agenerate(&messages, true, &observers, &self.llm_params)
                    .await
            }
        }
    }

    async fn open_stream(
        &self,
        query: &str,
        prompt: &str,
        probe: &Arc<LatencyProbe>,
    ) -> AppResult<LlmStream> {
        let messages = Self::messages(query, prompt);
        let observers = self.observers(probe);
        self.llm
            .astream_generate(&messages, &observers, &self.llm_params)
            .await
    }
}

fn search_span(mode: ExecutionMode) -> tracing::Span {
    tracing::info_span!("search", mode = mode.as_str())
}

async fn next_stream_item(
    start: Instant,
    mut tokens: LlmStream,
    probe: Arc<LatencyProbe>,
) -> Option<(AppResult<SearchStreamEvent>, StreamState)> {
    match tokens.next().await {
        Some(Ok(token)) => Some((
            Ok(SearchStreamEvent::Token(token)),
            StreamState::Tokens {
                start,
                tokens,
                probe,
            },
        )),
        Some(Err(e)) => Some((Err(e), StreamState::Done)),
        None => {
            let latency = probe.latency_since(start).map(|d| d.as_secs_f64());
            tracing::info!(
                "Streamed answer finished in {:.2}s (first token after {:?}s)",
                start.elapsed().as_secs_f64(),
                latency
            );
            Some((Ok(SearchStreamEvent::Completed { latency }), StreamState::Done))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tariff_core::AppError;
    use tariff_llm::LlmCallback;
    use tariff_prompt::PromptSource;

    struct NoopLlm;

    #[async_trait::async_trait]
    impl LlmClient for NoopLlm {
        fn provider_name(&self) -> &str {
            "noop"
        }

        fn generate(
            &self,
            _messages: &[ChatMessage],
            _streaming: bool,
            _callbacks: &[SharedCallback],
            _params: &LlmParams,
        ) -> AppResult<String> {
            Ok(String::new())
        }

        async fn agenerate(
            &self,
            _messages: &[ChatMessage],
            _streaming: bool,
            _callbacks: &[SharedCallback],
            _params: &LlmParams,
        ) -> AppResult<String> {
            Ok(String::new())
        }

        async fn astream_generate(
            &self,
            _messages: &[ChatMessage],
            _callbacks: &[SharedCallback],
            _params: &LlmParams,
        ) -> AppResult<LlmStream> {
            Err(AppError::Llm("not streaming".to_string()))
        }
    }

    struct EmptyContext;

    impl ContextBuilder for EmptyContext {
        fn build_context(&self, _request: &ContextRequest<'_>) -> AppResult<BuiltContext> {
            Ok(BuiltContext::default())
        }
    }

    #[test]
    fn test_defaults() {
        let orchestrator = SearchOrchestrator::new(Arc::new(NoopLlm), Arc::new(EmptyContext));
        assert_eq!(orchestrator.response_type(), "multiple paragraphs");
        assert_eq!(orchestrator.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(orchestrator.llm_params().max_tokens, 1500);
        assert_eq!(orchestrator.llm_params().temperature, 0.0);
        assert_eq!(orchestrator.failure_policy(), FailurePolicy::MaskGeneration);
    }

    #[test]
    fn test_from_config_prefers_prompt_response_type() {
        let config = SearchConfig {
            response_type: "bullet points".to_string(),
            max_tokens: 300,
            failure_policy: FailurePolicy::PropagateAll,
            ..SearchConfig::default()
        };
        let prompt = SystemPrompt {
            template: "{context_data}".to_string(),
            response_type: Some("single sentence".to_string()),
            source: PromptSource::BuiltIn,
        };

        let orchestrator = SearchOrchestrator::from_config(
            Arc::new(NoopLlm),
            Arc::new(EmptyContext),
            &config,
            &prompt,
        );
        assert_eq!(orchestrator.response_type(), "single sentence");
        assert_eq!(orchestrator.system_prompt(), "{context_data}");
        assert_eq!(orchestrator.llm_params().max_tokens, 300);
        assert_eq!(orchestrator.failure_policy(), FailurePolicy::PropagateAll);

        let prompt = SystemPrompt {
            response_type: None,
            ..prompt
        };
        let orchestrator = SearchOrchestrator::from_config(
            Arc::new(NoopLlm),
            Arc::new(EmptyContext),
            &config,
            &prompt,
        );
        assert_eq!(orchestrator.response_type(), "bullet points");
    }

    #[test]
    fn test_observers_put_probe_first() {
        let callbacks: Vec<SharedCallback> = vec![Arc::new(LatencyProbe::new())];
        let orchestrator = SearchOrchestrator::new(Arc::new(NoopLlm), Arc::new(EmptyContext))
            .with_callbacks(callbacks);
        let probe = Arc::new(LatencyProbe::new());
        let observers = orchestrator.observers(&probe);
        assert_eq!(observers.len(), 2);

        observers[0].on_llm_new_token("x");
        assert!(probe.first_token_at().is_some());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(ExecutionMode::Blocking.as_str(), "blocking");
        assert_eq!(ExecutionMode::Awaitable.as_str(), "awaitable");
        assert_eq!(ExecutionMode::Streamed.as_str(), "streamed");
    }
}
