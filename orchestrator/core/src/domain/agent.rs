// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent
//!
//! Boundary to the external autonomous multi-step agent. Delegated chat turns
//! are handed over through this interface and its events relayed verbatim.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer for the agent collaborator

use crate::domain::llm::{Message, TaskType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// Context handed to the agent alongside the normalized messages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// An event produced by the agent. Its shape belongs to the agent, so the
/// payload stays untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: Value,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Events in the order the agent produced them. An `Err` item means the
/// delegation was cut short and is always the last item.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

#[async_trait]
pub trait AutonomousAgent: Send + Sync {
    async fn run(
        &self,
        messages: Vec<Message>,
        context: AgentContext,
    ) -> Result<AgentEventStream, AgentError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("Agent unreachable: {0}")]
    Unreachable(String),

    #[error("Agent rejected the request: {0}")]
    Rejected(String),

    #[error("Agent event stream interrupted: {0}")]
    Interrupted(String),
}

impl AgentError {
    /// Stable identifier published as the `reason` of `command_failed`
    pub fn reason(&self) -> &'static str {
        match self {
            AgentError::Unreachable(_) => "agent_unreachable",
            AgentError::Rejected(_) => "agent_rejected",
            AgentError::Interrupted(_) => "agent_interrupted",
        }
    }
}
