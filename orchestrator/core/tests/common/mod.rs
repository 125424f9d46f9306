// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scripted test doubles shared by the integration tests

#![allow(dead_code)]

use aegis_router_core::application::LlmRouter;
use aegis_router_core::domain::agent::{
    AgentContext, AgentError, AgentEvent, AgentEventStream, AutonomousAgent,
};
use aegis_router_core::domain::llm::{
    ChunkStream, Completion, LLMError, LLMProvider, Message, StreamChunk, TaskType,
};
use aegis_router_core::domain::routing::{ProviderRoute, TaskRouting};
use aegis_router_core::infrastructure::event_bus::EventBus;
use aegis_router_core::infrastructure::registry::AdapterRegistry;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a mock provider does on one call
#[derive(Clone, Debug)]
pub enum Step {
    Reply(String),
    ReplyAfter(Duration, String),
    Fail(LLMError),
    /// Never completes
    Hang,
    /// Raw chunks handed out by `chat_stream`
    Chunks(Vec<Result<StreamChunk, LLMError>>),
    /// Chunks, then the stream stays open forever
    ChunksThenHang(Vec<StreamChunk>),
}

pub fn reply(text: &str) -> Step {
    Step::Reply(text.to_string())
}

/// Provider that plays a script, one step per call. The last step repeats.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    healthy: Result<(), LLMError>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            healthy: Ok(()),
        })
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::new(vec![step])
    }

    pub fn unhealthy(step: Step, error: LLMError) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(vec![step].into()),
            calls: AtomicUsize::new(0),
            healthy: Err(error),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        _messages: &[Message],
        model: Option<&str>,
    ) -> Result<Completion, LLMError> {
        let content = match self.next_step() {
            Step::Reply(text) => text,
            Step::ReplyAfter(delay, text) => {
                tokio::time::sleep(delay).await;
                text
            }
            Step::Fail(e) => return Err(e),
            Step::Hang => futures::future::pending().await,
            Step::Chunks(_) | Step::ChunksThenHang(_) => {
                return Err(LLMError::InvalidInput("scripted for streaming only".into()))
            }
        };
        Ok(Completion {
            content,
            tokens_used: 3,
            model: model.map(str::to_string),
        })
    }

    async fn chat_stream(
        &self,
        _messages: &[Message],
        _model: Option<&str>,
    ) -> Result<ChunkStream, LLMError> {
        match self.next_step() {
            Step::Reply(text) => Ok(chunks(vec![
                Ok(StreamChunk::Delta(text)),
                Ok(StreamChunk::Done),
            ])),
            Step::ReplyAfter(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(chunks(vec![Ok(StreamChunk::Delta(text)), Ok(StreamChunk::Done)]))
            }
            Step::Fail(e) => Err(e),
            Step::Hang => Ok(Box::pin(futures::stream::pending::<Result<StreamChunk, LLMError>>())),
            Step::Chunks(items) => Ok(chunks(items)),
            Step::ChunksThenHang(items) => Ok(Box::pin(
                futures::stream::iter(items.into_iter().map(Ok)).chain(futures::stream::pending()),
            )),
        }
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.healthy.clone()
    }
}

fn chunks(items: Vec<Result<StreamChunk, LLMError>>) -> ChunkStream {
    Box::pin(futures::stream::iter(items))
}

pub fn route(names: &[&str]) -> Vec<ProviderRoute> {
    names.iter().map(|name| ProviderRoute::new(*name)).collect()
}

/// Router over `providers` with `simple_text` routed through them in order
pub fn router_with(
    providers: &[(&str, Arc<ScriptedProvider>)]) -> (Arc<AdapterRegistry>, LlmRouter,
) {
    let names: Vec<&str> = providers.iter().map(|(name, _)| *name).collect();
    router_with_routing(providers, TaskRouting::new().route(TaskType::SimpleText, route(&names)))
}

pub fn router_with_routing(
    providers: &[(&str, Arc<ScriptedProvider>)],
    routing: TaskRouting,
) -> (Arc<AdapterRegistry>, LlmRouter) {
    let registry = Arc::new(AdapterRegistry::new());
    for (name, provider) in providers {
        registry.register_provider(*name, provider.clone());
    }
    let router = LlmRouter::new(registry.clone(), routing, EventBus::new(1024));
    (registry, router)
}

/// Agent that records what it was given and replays fixed events
pub struct RecordingAgent {
    events: Vec<AgentEvent>,
    interruption: Option<AgentError>,
    rejection: Option<AgentError>,
    pub received: Mutex<Vec<(Vec<Message>, AgentContext)>>,
}

impl RecordingAgent {
    pub fn new(events: Vec<AgentEvent>) -> Arc<Self> {
        Arc::new(Self {
            events,
            interruption: None,
            rejection: None,
            received: Mutex::new(Vec::new()),
        })
    }

    /// Replays `events`, then ends the stream with `error`
    pub fn interrupted(events: Vec<AgentEvent>, error: AgentError) -> Arc<Self> {
        Arc::new(Self {
            events,
            interruption: Some(error),
            rejection: None,
            received: Mutex::new(Vec::new()),
        })
    }

    /// Fails `run` outright
    pub fn rejecting(error: AgentError) -> Arc<Self> {
        Arc::new(Self {
            events: Vec::new(),
            interruption: None,
            rejection: Some(error),
            received: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AutonomousAgent for RecordingAgent {
    async fn run(
        &self,
        messages: Vec<Message>,
        context: AgentContext,
    ) -> Result<AgentEventStream, AgentError> {
        self.received.lock().unwrap().push((messages, context));
        if let Some(error) = &self.rejection {
            return Err(error.clone());
        }

        let mut items: Vec<Result<AgentEvent, AgentError>> =
            self.events.iter().cloned().map(Ok).collect();
        if let Some(error) = &self.interruption {
            items.push(Err(error.clone()));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
