// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chat Orchestrator
//!
//! Decides per turn whether the router answers directly or the autonomous
//! agent takes over, then relays whichever result it gets. The decision only
//! looks at the current turn; nothing is remembered between turns.
//!
//! Direct turns get their lifecycle events from the router. Delegated turns
//! publish their own `command_started`, one `command_output` per relayed agent
//! event and exactly one `command_completed` / `command_failed`, tagged with a
//! fresh `invocation_id`. A turn rejected before dispatch publishes an untagged
//! `command_failed`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Turn classification and dispatch to router or agent flow

use crate::application::router::{LlmRouter, RouteRequest, RouterError, RouterOutput};
use crate::domain::agent::{AgentContext, AgentError, AgentEventStream};
use crate::domain::events::{Event, EventType, InvocationId};
use crate::domain::llm::{Message, MessageRole, TaskType};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::registry::AdapterRegistry;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_AGENT_FLOW: &str = "autonomous_agent";

const ACTION_VERBS: &[&str] = &[
    "build", "builds", "building", "built",
    "create", "creates", "creating",
    "deploy", "deploys", "deploying",
    "launch", "launches", "launching",
    "scaffold", "scaffolds", "scaffolding",
    "automate", "automates", "automating",
    "provision", "provisions", "provisioning",
    "setup",
];

const DELIVERABLES: &[&str] = &[
    "app", "apps", "application", "applications",
    "website", "websites", "site", "sites",
    "service", "services", "microservice", "microservices",
    "api", "apis", "pipeline", "pipelines",
    "campaign", "campaigns", "autopilot", "autopilots",
    "workflow", "workflows", "project", "projects",
    "bot", "bots", "chatbot", "chatbots",
];

const CODE_VOCABULARY: &[&str] = &[
    "code", "function", "functions", "method", "class", "struct", "enum",
    "compile", "compiler", "refactor", "debug", "bug", "stacktrace",
    "regex", "sql", "query", "snippet", "script", "implement", "unittest",
    "rust", "python", "javascript", "typescript", "golang", "java", "bash",
    "fn", "def", "impl", "const", "async", "await", "lambda",
];

/// Caller override for the direct/delegate decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnIntent {
    #[default]
    Auto,
    Direct,
    Delegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    Direct,
    Delegate,
}

impl fmt::Display for TurnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnMode::Direct => f.write_str("direct"),
            TurnMode::Delegate => f.write_str("delegate"),
        }
    }
}

/// One inbound conversational turn
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub messages: Vec<Message>,
    pub intent: TurnIntent,
    pub task_hint: Option<TaskType>,
    pub streaming: bool,
    pub conversation_id: Option<String>,
    pub cancel: CancellationToken,
}

impl ChatTurn {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            intent: TurnIntent::Auto,
            task_hint: None,
            streaming: false,
            conversation_id: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![Message::user(prompt)])
    }

    pub fn with_intent(mut self, intent: TurnIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_task_hint(mut self, task_type: TaskType) -> Self {
        self.task_hint = Some(task_type);
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The newest non-blank user message; this is what gets classified
    pub fn latest_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnDecision {
    pub mode: TurnMode,
    pub task_type: TaskType,
}

pub enum TurnOutcome {
    Direct(RouterOutput),
    Delegated(AgentEventStream),
}

impl TurnOutcome {
    pub fn mode(&self) -> TurnMode {
        match self {
            TurnOutcome::Direct(_) => TurnMode::Direct,
            TurnOutcome::Delegated(_) => TurnMode::Delegate,
        }
    }

    pub fn into_direct(self) -> Option<RouterOutput> {
        match self {
            TurnOutcome::Direct(output) => Some(output),
            TurnOutcome::Delegated(_) => None,
        }
    }
}

impl fmt::Debug for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnOutcome::Direct(output) => f.debug_tuple("Direct").field(output).finish(),
            TurnOutcome::Delegated(_) => f.write_str("Delegated(..)"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Chat turn has no user message")]
    EmptyTurn,

    #[error("No autonomous agent registered under flow '{0}'")]
    AgentNotRegistered(String),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl OrchestratorError {
    pub fn reason(&self) -> &'static str {
        match self {
            OrchestratorError::EmptyTurn => "empty_turn",
            OrchestratorError::AgentNotRegistered(_) => "agent_not_registered",
            OrchestratorError::Router(e) => e.reason(),
            OrchestratorError::Agent(e) => e.reason(),
        }
    }
}

pub struct ChatOrchestrator {
    router: Arc<LlmRouter>,
    registry: Arc<AdapterRegistry>,
    events: EventBus,
    agent_flow: String,
}

impl ChatOrchestrator {
    /// Publishes on the router's event bus
    pub fn new(router: Arc<LlmRouter>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            events: router.events().clone(),
            router,
            registry,
            agent_flow: DEFAULT_AGENT_FLOW.to_string(),
        }
    }

    /// Registry flow name the delegate path looks up
    pub fn with_agent_flow(mut self, flow: impl Into<String>) -> Self {
        self.agent_flow = flow.into();
        self
    }

    pub fn router(&self) -> &Arc<LlmRouter> {
        &self.router
    }

    pub fn classify(&self, turn: &ChatTurn) -> Result<TurnDecision, OrchestratorError> {
        classify_turn(turn)
    }

    pub async fn handle(&self, turn: ChatTurn) -> Result<TurnOutcome, OrchestratorError> {
        let decision = match classify_turn(&turn) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Rejected chat turn");
                self.events.publish(
                    Event::new(EventType::CommandFailed)
                        .with("reason", e.reason())
                        .with("error", e.to_string()),
                );
                return Err(e);
            }
        };
        info!(mode = %decision.mode, task_type = %decision.task_type, "Classified chat turn");

        match decision.mode {
            TurnMode::Direct => {
                let request = RouteRequest::new(decision.task_type, turn.messages)
                    .streaming(turn.streaming)
                    .with_cancel(turn.cancel);
                let output = self.router.route(request).await?;
                Ok(TurnOutcome::Direct(output))
            }
            TurnMode::Delegate => {
                let mut delegation =
                    Delegation::start(self.events.clone(), &self.agent_flow, decision.task_type);
                match self.delegate(decision.task_type, turn).await {
                    Ok(upstream) => Ok(TurnOutcome::Delegated(delegation.relay(upstream))),
                    Err(e) => {
                        delegation.failed(&e);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn delegate(
        &self,
        task_type: TaskType,
        turn: ChatTurn,
    ) -> Result<AgentEventStream, OrchestratorError> {
        let agent = self
            .registry
            .flow(&self.agent_flow)
            .ok_or_else(|| OrchestratorError::AgentNotRegistered(self.agent_flow.clone()))?;

        let context = AgentContext {
            task_type: Some(task_type),
            conversation_id: turn.conversation_id,
        };
        debug!(flow = %self.agent_flow, "Delegating turn to autonomous agent");
        Ok(agent.run(turn.messages, context).await?)
    }
}

/// Lifecycle of one delegated turn. Dropping it unfinished, e.g. when the
/// caller drops the relayed stream, publishes `command_failed` with
/// `reason = "cancelled"`.
struct Delegation {
    events: EventBus,
    invocation_id: InvocationId,
    flow: String,
    task_type: TaskType,
    relayed: usize,
    finished: bool,
}

impl Delegation {
    fn start(events: EventBus, flow: &str, task_type: TaskType) -> Self {
        let delegation = Self {
            events,
            invocation_id: InvocationId::new(),
            flow: flow.to_string(),
            task_type,
            relayed: 0,
            finished: false,
        };
        delegation.events.publish(delegation.event(EventType::CommandStarted));
        delegation
    }

    fn event(&self, event_type: EventType) -> Event {
        Event::for_invocation(event_type, self.invocation_id)
            .with("mode", TurnMode::Delegate.to_string())
            .with("flow", self.flow.as_str())
            .with("task_type", self.task_type.as_str())
    }

    fn failed(&mut self, error: &OrchestratorError) {
        self.finished = true;
        warn!(flow = %self.flow, error = %error, "Delegated turn failed");
        self.events.publish(
            self.event(EventType::CommandFailed)
                .with("reason", error.reason())
                .with("error", error.to_string())
                .with("events", self.relayed),
        );
    }

    /// Pass agent events through untouched while publishing the lifecycle
    fn relay(self, mut upstream: AgentEventStream) -> AgentEventStream {
        let mut delegation = self;
        Box::pin(async_stream::stream! {
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(event) => {
                        delegation.relayed += 1;
                        let output = delegation
                            .event(EventType::CommandOutput)
                            .with("agent_event", event.kind.as_str());
                        delegation.events.publish(output);
                        yield Ok(event);
                    }
                    Err(e) => {
                        delegation.failed(&OrchestratorError::Agent(e.clone()));
                        yield Err(e);
                        return;
                    }
                }
            }
            delegation.finished = true;
            let completed = delegation
                .event(EventType::CommandCompleted)
                .with("events", delegation.relayed);
            delegation.events.publish(completed);
        })
    }
}

impl Drop for Delegation {
    fn drop(&mut self) {
        if !self.finished {
            debug!(invocation_id = %self.invocation_id, "Delegated turn dropped before completion");
            self.events.publish(
                self.event(EventType::CommandFailed)
                    .with("reason", "cancelled")
                    .with("events", self.relayed),
            );
        }
    }
}

/// Pure classification of a single turn
pub fn classify_turn(turn: &ChatTurn) -> Result<TurnDecision, OrchestratorError> {
    let text = turn.latest_user_text().ok_or(OrchestratorError::EmptyTurn)?;

    let mode = match turn.intent {
        TurnIntent::Direct => TurnMode::Direct,
        TurnIntent::Delegate => TurnMode::Delegate,
        TurnIntent::Auto if requests_deliverable(text) => TurnMode::Delegate,
        TurnIntent::Auto => TurnMode::Direct,
    };

    let task_type = turn.task_hint.unwrap_or_else(|| {
        if looks_like_code(text) {
            TaskType::CodeGeneration
        } else {
            TaskType::SimpleText
        }
    });

    Ok(TurnDecision { mode, task_type })
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Action verb plus deliverable noun, e.g. "deploy my website"
fn requests_deliverable(text: &str) -> bool {
    let words = words(text);
    let has_verb = words.iter().any(|w| ACTION_VERBS.contains(&w.as_str()))
        || words.windows(2).any(|pair| {
            matches!(pair[0].as_str(), "set" | "sets" | "setting") && pair[1] == "up"
        });
    has_verb && words.iter().any(|w| DELIVERABLES.contains(&w.as_str()))
}

fn looks_like_code(text: &str) -> bool {
    if text.contains("```") {
        return true;
    }
    if ["();", "=>", "->", "::", "{}"].iter().any(|token| text.contains(token)) {
        return true;
    }
    words(text).iter().any(|w| CODE_VOCABULARY.contains(&w.as_str()))
}
