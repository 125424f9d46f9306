// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM Router
//!
//! Resolves a task type to its ordered provider chain, executes the chain with
//! fallback and keeps per-provider health statistics up to date.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates provider selection, fallback and lifecycle events
//!
//! # Invocation lifecycle
//!
//! Every invocation publishes `command_started`, zero or more
//! `command_output` (streaming only) and exactly one of `command_completed` /
//! `command_failed`, all tagged with the same `invocation_id`. Dropping an
//! invocation (or its response stream) before it finishes publishes
//! `command_failed` with `reason = "cancelled"` and leaves health untouched.
//!
//! Streaming falls back only until the first fragment has been handed to the
//! caller. After that a provider failure ends the stream with
//! [`RouterError::MidStreamFailure`].

use crate::application::provider_health::ProviderHealth;
use crate::domain::adapter::AdapterCategory;
use crate::domain::events::{Event, EventType, InvocationId};
use crate::domain::llm::{
    ChunkStream, LLMError, LLMProvider, LLMResponse, Message, StreamChunk, TaskType,
};
use crate::domain::provider_status::ProviderStatus;
use crate::domain::routing::{ProviderRoute, TaskRouting};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::registry::AdapterRegistry;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// One failed attempt inside a fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{provider}: {error}")]
pub struct ProviderFailure {
    pub provider: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: LLMError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No route configured for task type {0}")]
    UnknownTaskRoute(TaskType),

    #[error("No provider available for {task_type}: {}", format_failures(.failures))]
    NoProviderAvailable {
        task_type: TaskType,
        failures: Vec<ProviderFailure>,
    },

    #[error("Provider '{provider}' failed after {fragments} fragment(s): {error}")]
    MidStreamFailure {
        provider: String,
        fragments: usize,
        error: LLMError,
    },

    #[error("Invocation cancelled")]
    Cancelled,
}

impl RouterError {
    /// Stable identifier published as the `reason` of `command_failed`
    pub fn reason(&self) -> &'static str {
        match self {
            RouterError::Configuration(_) => "configuration",
            RouterError::UnknownTaskRoute(_) => "unknown_task_route",
            RouterError::NoProviderAvailable { .. } => "no_provider_available",
            RouterError::MidStreamFailure { .. } => "mid_stream_failure",
            RouterError::Cancelled => "cancelled",
        }
    }
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no candidates attempted".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn serialize_display<S: serde::Serializer>(
    value: &LLMError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Trailer of a successful stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSummary {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub task_type: TaskType,
    pub fallback_used: bool,
    pub latency_ms: u64,
    pub fragments: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Fragment(String),
    /// Explicit end marker; nothing follows it
    Done(StreamSummary),
}

pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, RouterError>> + Send>>;

pub enum RouterOutput {
    Complete(LLMResponse),
    Stream(ResponseStream),
}

impl RouterOutput {
    pub fn into_response(self) -> Option<LLMResponse> {
        match self {
            RouterOutput::Complete(response) => Some(response),
            RouterOutput::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<ResponseStream> {
        match self {
            RouterOutput::Complete(_) => None,
            RouterOutput::Stream(stream) => Some(stream),
        }
    }
}

impl fmt::Debug for RouterOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterOutput::Complete(response) => f.debug_tuple("Complete").field(response).finish(),
            RouterOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A single routed invocation
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub invocation_id: InvocationId,
    pub task_type: TaskType,
    pub messages: Vec<Message>,
    pub streaming: bool,
    pub cancel: CancellationToken,
}

impl RouteRequest {
    pub fn new(task_type: TaskType, messages: Vec<Message>) -> Self {
        Self {
            invocation_id: InvocationId::new(),
            task_type,
            messages,
            streaming: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_invocation_id(mut self, invocation_id: InvocationId) -> Self {
        self.invocation_id = invocation_id;
        self
    }
}

#[derive(Clone)]
struct Candidate {
    route: ProviderRoute,
    provider: Arc<dyn LLMProvider>,
    fallback: bool,
}

pub struct LlmRouter {
    registry: Arc<AdapterRegistry>,
    routing: Arc<TaskRouting>,
    health: Arc<ProviderHealth>,
    events: EventBus,
}

impl LlmRouter {
    pub fn new(registry: Arc<AdapterRegistry>, routing: TaskRouting, events: EventBus) -> Self {
        Self {
            health: Arc::new(ProviderHealth::new(DEFAULT_FAILURE_THRESHOLD, events.clone())),
            registry,
            routing: Arc::new(routing),
            events,
        }
    }

    /// Consecutive failures before a provider is marked unavailable (0 disables)
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.health = Arc::new(ProviderHealth::new(threshold, self.events.clone()));
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn routing(&self) -> &TaskRouting {
        &self.routing
    }

    pub async fn invoke(
        &self,
        task_type: TaskType,
        messages: Vec<Message>,
        streaming: bool,
    ) -> Result<RouterOutput, RouterError> {
        self.route(RouteRequest::new(task_type, messages).streaming(streaming)).await
    }

    pub async fn complete(
        &self,
        task_type: TaskType,
        messages: Vec<Message>,
    ) -> Result<LLMResponse, RouterError> {
        self.complete_cancellable(task_type, messages, CancellationToken::new()).await
    }

    pub async fn complete_cancellable(
        &self,
        task_type: TaskType,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, RouterError> {
        let request = RouteRequest::new(task_type, messages).with_cancel(cancel);
        let mut lifecycle = InvocationLifecycle::start(self.events.clone(), &request);
        let candidates = self.plan(request.task_type).map_err(|e| self.fail(&mut lifecycle, e))?;
        self.run_complete(&request, candidates, lifecycle).await
    }

    pub async fn stream(
        &self,
        task_type: TaskType,
        messages: Vec<Message>,
    ) -> Result<ResponseStream, RouterError> {
        self.stream_cancellable(task_type, messages, CancellationToken::new()).await
    }

    pub async fn stream_cancellable(
        &self,
        task_type: TaskType,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<ResponseStream, RouterError> {
        let request = RouteRequest::new(task_type, messages)
            .streaming(true)
            .with_cancel(cancel);
        let mut lifecycle = InvocationLifecycle::start(self.events.clone(), &request);
        let candidates = self.plan(request.task_type).map_err(|e| self.fail(&mut lifecycle, e))?;
        self.open_stream(&request, candidates, lifecycle).await
    }

    /// General entry point behind `invoke`
    pub async fn route(&self, request: RouteRequest) -> Result<RouterOutput, RouterError> {
        let mut lifecycle = InvocationLifecycle::start(self.events.clone(), &request);
        let candidates = self.plan(request.task_type).map_err(|e| self.fail(&mut lifecycle, e))?;

        if request.streaming {
            self.open_stream(&request, candidates, lifecycle)
                .await
                .map(RouterOutput::Stream)
        } else {
            self.run_complete(&request, candidates, lifecycle)
                .await
                .map(RouterOutput::Complete)
        }
    }

    pub fn provider_status(&self, provider: &str) -> Option<ProviderStatus> {
        self.health.status(provider)
    }

    pub fn provider_statuses(&self) -> Vec<ProviderStatus> {
        self.health.statuses()
    }

    pub fn set_availability(&self, provider: &str, available: bool) -> ProviderStatus {
        self.health.set_available(provider, available, "operator override")
    }

    /// Check every registered provider concurrently and set availability from
    /// the result. Request counters are not touched.
    pub async fn health_check_all(&self) -> Vec<(String, Result<(), LLMError>)> {
        let checks = self
            .registry
            .list(AdapterCategory::LlmProvider)
            .into_iter()
            .filter_map(|name| self.registry.provider(&name).map(|provider| (name, provider)))
            .map(|(name, provider)| async move {
                let result = provider.health_check().await;
                (name, result)
            });

        let results = futures::future::join_all(checks).await;
        for (name, result) in &results {
            match result {
                Ok(()) => {
                    self.health.set_available(name, true, "health check passed");
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider health check failed");
                    self.health
                        .set_available(name, false, &format!("health check failed: {}", e));
                }
            }
        }
        results
    }

    /// Ordered attempt list: configured chain, unregistered providers dropped,
    /// unavailable providers dropped unless that would leave nothing.
    fn plan(&self, task_type: TaskType) -> Result<Vec<Candidate>, RouterError> {
        let chain = self.routing.candidates(task_type);
        if chain.is_empty() {
            return Err(RouterError::UnknownTaskRoute(task_type));
        }

        let mut resolved = Vec::with_capacity(chain.len());
        let mut unregistered = Vec::new();
        for (position, route) in chain.iter().enumerate() {
            match self.registry.provider(&route.provider) {
                Some(provider) => resolved.push(Candidate {
                    fallback: position > 0,
                    route: route.clone(),
                    provider,
                }),
                None => {
                    warn!(provider = %route.provider, task_type = %task_type, "Route references an unregistered provider");
                    unregistered.push(ProviderFailure {
                        provider: route.provider.clone(),
                        error: LLMError::Configuration("provider is not registered".into()),
                    });
                }
            }
        }

        if resolved.is_empty() {
            return Err(RouterError::NoProviderAvailable {
                task_type,
                failures: unregistered,
            });
        }

        let available: Vec<Candidate> = resolved
            .iter()
            .filter(|c| self.health.is_available(&c.route.provider))
            .cloned()
            .collect();

        if available.is_empty() {
            warn!(task_type = %task_type, "Every candidate is marked unavailable, trying the full chain");
            Ok(resolved)
        } else {
            Ok(available)
        }
    }

    async fn run_complete(
        &self,
        request: &RouteRequest,
        candidates: Vec<Candidate>,
        mut lifecycle: InvocationLifecycle,
    ) -> Result<LLMResponse, RouterError> {
        let mut failures = Vec::new();

        for candidate in candidates {
            let name = candidate.route.provider.as_str();
            debug!(invocation_id = %request.invocation_id, provider = %name, "Attempting provider");

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = request.cancel.cancelled() => None,
                result = candidate.provider.chat(&request.messages, candidate.route.model.as_deref()) => Some(result),
            };
            let Some(result) = outcome else {
                info!(invocation_id = %request.invocation_id, provider = %name, "Invocation cancelled");
                return Err(self.fail(&mut lifecycle, RouterError::Cancelled));
            };
            let latency_ms = elapsed_ms(started);

            match result {
                Ok(completion) => {
                    self.health.record_success(name, latency_ms);
                    let response = LLMResponse {
                        provider: name.to_string(),
                        content: completion.content,
                        tokens_used: completion.tokens_used,
                        latency_ms,
                        fallback_used: candidate.fallback,
                        task_type: request.task_type,
                        model: completion.model.or_else(|| candidate.route.model.clone()),
                    };
                    if response.fallback_used {
                        info!(provider = %name, task_type = %request.task_type, "Request served by fallback provider");
                    }
                    lifecycle.completed(
                        Event::for_invocation(EventType::CommandCompleted, request.invocation_id)
                            .with("provider", name)
                            .with("model", json!(response.model))
                            .with("tokens_used", response.tokens_used)
                            .with("latency_ms", latency_ms)
                            .with("fallback_used", response.fallback_used),
                    );
                    return Ok(response);
                }
                Err(e) if e.is_configuration() => {
                    error!(provider = %name, error = %e, "Provider is misconfigured");
                    return Err(self.fail(
                        &mut lifecycle,
                        RouterError::Configuration(format!("{}: {}", name, e)),
                    ));
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, latency_ms, "Provider attempt failed");
                    self.health.record_failure(name, &e);
                    failures.push(ProviderFailure {
                        provider: name.to_string(),
                        error: e,
                    });
                }
            }
        }

        Err(self.fail(
            &mut lifecycle,
            RouterError::NoProviderAvailable {
                task_type: request.task_type,
                failures,
            },
        ))
    }

    /// Walk the chain until a provider produces its first chunk, then hand the
    /// rest of that provider's stream to the caller.
    async fn open_stream(
        &self,
        request: &RouteRequest,
        candidates: Vec<Candidate>,
        mut lifecycle: InvocationLifecycle,
    ) -> Result<ResponseStream, RouterError> {
        let mut failures = Vec::new();

        for candidate in candidates {
            let name = candidate.route.provider.clone();
            debug!(invocation_id = %request.invocation_id, provider = %name, "Opening provider stream");

            let started = Instant::now();
            let opened = tokio::select! {
                biased;
                _ = request.cancel.cancelled() => None,
                result = first_chunk(candidate.provider.as_ref(), &request.messages, candidate.route.model.as_deref()) => Some(result),
            };
            let Some(result) = opened else {
                info!(invocation_id = %request.invocation_id, provider = %name, "Invocation cancelled");
                return Err(self.fail(&mut lifecycle, RouterError::Cancelled));
            };

            match result {
                Ok((upstream, opening)) => {
                    let active = ActiveStream {
                        provider: name,
                        model: candidate.route.model.clone(),
                        fallback_used: candidate.fallback,
                        task_type: request.task_type,
                        started,
                        upstream,
                        health: self.health.clone(),
                        cancel: request.cancel.clone(),
                        lifecycle,
                    };
                    return Ok(active.relay(opening));
                }
                Err(e) if e.is_configuration() => {
                    error!(provider = %name, error = %e, "Provider is misconfigured");
                    return Err(self.fail(
                        &mut lifecycle,
                        RouterError::Configuration(format!("{}: {}", name, e)),
                    ));
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider stream failed before first fragment");
                    self.health.record_failure(&name, &e);
                    failures.push(ProviderFailure {
                        provider: name,
                        error: e,
                    });
                }
            }
        }

        Err(self.fail(
            &mut lifecycle,
            RouterError::NoProviderAvailable {
                task_type: request.task_type,
                failures,
            },
        ))
    }

    fn fail(&self, lifecycle: &mut InvocationLifecycle, error: RouterError) -> RouterError {
        lifecycle.failed(&error);
        if let RouterError::NoProviderAvailable {
            task_type,
            failures,
        } = &error
        {
            error!(task_type = %task_type, attempts = failures.len(), "Fallback chain exhausted");
            self.events.publish(
                Event::new(EventType::SystemAlert)
                    .with("severity", "error")
                    .with("task_type", task_type.as_str())
                    .with("message", error.to_string()),
            );
        }
        error
    }
}

enum Opening {
    Fragment(String),
    Finished,
}

async fn first_chunk(
    provider: &dyn LLMProvider,
    messages: &[Message],
    model: Option<&str>,
) -> Result<(ChunkStream, Opening), LLMError> {
    let mut upstream = provider.chat_stream(messages, model).await?;
    match upstream.next().await {
        Some(Ok(StreamChunk::Delta(text))) => Ok((upstream, Opening::Fragment(text))),
        Some(Ok(StreamChunk::Done)) => Ok((upstream, Opening::Finished)),
        Some(Err(e)) => Err(e),
        None => Err(truncated()),
    }
}

fn truncated() -> LLMError {
    LLMError::Network("stream ended without an end marker".into())
}

/// A provider stream that has already produced its first chunk
struct ActiveStream {
    provider: String,
    model: Option<String>,
    fallback_used: bool,
    task_type: TaskType,
    started: Instant,
    upstream: ChunkStream,
    health: Arc<ProviderHealth>,
    cancel: CancellationToken,
    lifecycle: InvocationLifecycle,
}

impl ActiveStream {
    fn relay(self, opening: Opening) -> ResponseStream {
        let ActiveStream {
            provider,
            model,
            fallback_used,
            task_type,
            started,
            mut upstream,
            health,
            cancel,
            mut lifecycle,
        } = self;

        Box::pin(async_stream::stream! {
            let mut fragments = 0usize;
            let mut finished = false;

            match opening {
                Opening::Fragment(text) => {
                    fragments += 1;
                    lifecycle.output(&text);
                    yield Ok(StreamEvent::Fragment(text));
                }
                Opening::Finished => finished = true,
            }

            while !finished {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    item = upstream.next() => Some(item),
                };

                let failure = match next {
                    None => {
                        info!(provider = %provider, fragments, "Stream cancelled by caller");
                        let error = RouterError::Cancelled;
                        lifecycle.failed(&error);
                        yield Err(error);
                        return;
                    }
                    Some(Some(Ok(StreamChunk::Delta(text)))) => {
                        fragments += 1;
                        lifecycle.output(&text);
                        yield Ok(StreamEvent::Fragment(text));
                        continue;
                    }
                    Some(Some(Ok(StreamChunk::Done))) => {
                        finished = true;
                        continue;
                    }
                    Some(Some(Err(e))) => e,
                    Some(None) => truncated(),
                };

                warn!(provider = %provider, fragments, error = %failure, "Provider failed mid-stream");
                health.record_failure(&provider, &failure);
                let error = RouterError::MidStreamFailure {
                    provider: provider.clone(),
                    fragments,
                    error: failure,
                };
                lifecycle.failed(&error);
                yield Err(error);
                return;
            }

            let latency_ms = elapsed_ms(started);
            health.record_success(&provider, latency_ms);
            let summary = StreamSummary {
                provider: provider.clone(),
                model,
                task_type,
                fallback_used,
                latency_ms,
                fragments,
            };
            let completed = lifecycle
                .event(EventType::CommandCompleted)
                .with("provider", provider.as_str())
                .with("model", json!(summary.model))
                .with("fragments", fragments)
                .with("latency_ms", latency_ms)
                .with("fallback_used", fallback_used);
            lifecycle.completed(completed);
            yield Ok(StreamEvent::Done(summary));
        })
    }
}

/// Publishes the command lifecycle of one invocation. Dropping it before a
/// terminal event was sent reports the invocation as cancelled.
struct InvocationLifecycle {
    events: EventBus,
    invocation_id: InvocationId,
    task_type: TaskType,
    finished: bool,
}

impl InvocationLifecycle {
    fn start(events: EventBus, request: &RouteRequest) -> Self {
        debug!(
            invocation_id = %request.invocation_id,
            task_type = %request.task_type,
            streaming = request.streaming,
            "Routing invocation"
        );
        let lifecycle = Self {
            events,
            invocation_id: request.invocation_id,
            task_type: request.task_type,
            finished: false,
        };
        lifecycle.events.publish(
            lifecycle
                .event(EventType::CommandStarted)
                .with("streaming", request.streaming)
                .with("messages", request.messages.len()),
        );
        lifecycle
    }

    fn event(&self, event_type: EventType) -> Event {
        Event::for_invocation(event_type, self.invocation_id)
            .with("task_type", self.task_type.as_str())
    }

    fn output(&self, fragment: &str) {
        self.events
            .publish(self.event(EventType::CommandOutput).with("fragment", fragment));
    }

    fn completed(&mut self, event: Event) {
        self.finished = true;
        self.events.publish(event);
    }

    fn failed(&mut self, error: &RouterError) {
        self.finished = true;
        let mut event = self
            .event(EventType::CommandFailed)
            .with("reason", error.reason())
            .with("error", error.to_string());
        if let RouterError::NoProviderAvailable { failures, .. } = error {
            event = event.with("failures", json!(failures));
        }
        self.events.publish(event);
    }
}

impl Drop for InvocationLifecycle {
    fn drop(&mut self) {
        if !self.finished {
            debug!(invocation_id = %self.invocation_id, "Invocation dropped before completion");
            self.failed(&RouterError::Cancelled);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
