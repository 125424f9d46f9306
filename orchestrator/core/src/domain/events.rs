// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Identifier shared by every lifecycle event of one router invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The fixed set of event kinds consumed by observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CommandStarted,
    CommandOutput,
    CommandCompleted,
    CommandFailed,
    ServiceStatusChanged,
    MetricsUpdate,
    SystemAlert,
}

impl EventType {
    /// True for the events that bracket a single invocation
    pub fn is_command_lifecycle(&self) -> bool {
        matches!(
            self,
            EventType::CommandStarted
                | EventType::CommandOutput
                | EventType::CommandCompleted
                | EventType::CommandFailed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::CommandCompleted | EventType::CommandFailed)
    }
}

/// Write-once event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            data: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach an invocation id so filtered subscribers can pick the event up
    pub fn for_invocation(event_type: EventType, invocation_id: InvocationId) -> Self {
        Self::new(event_type).with("invocation_id", invocation_id.to_string())
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn invocation_id(&self) -> Option<InvocationId> {
        self.data
            .get("invocation_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(InvocationId)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}
