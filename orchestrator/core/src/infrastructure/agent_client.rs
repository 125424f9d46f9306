// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP client for the autonomous agent service
//!
//! Posts a delegated turn to the agent endpoint and relays the NDJSON event
//! stream it answers with. Lines that do not parse as an event are skipped; a
//! transport failure mid-body ends the stream with `AgentError::Interrupted`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements the `AutonomousAgent` boundary over HTTP

use crate::domain::agent::{AgentContext, AgentError, AgentEvent, AgentEventStream, AutonomousAgent};
use crate::domain::llm::Message;
use crate::infrastructure::llm::stream::LineBuffer;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, warn};

pub struct HttpAutonomousAgent {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct AgentRunRequest<'a> {
    messages: &'a [Message],
    context: &'a AgentContext,
}

impl HttpAutonomousAgent {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AutonomousAgent for HttpAutonomousAgent {
    async fn run(
        &self,
        messages: Vec<Message>,
        context: AgentContext,
    ) -> Result<AgentEventStream, AgentError> {
        debug!(endpoint = %self.endpoint, "Delegating turn to autonomous agent");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/x-ndjson")
            .json(&AgentRunRequest {
                messages: &messages,
                context: &context,
            })
            .send()
            .await
            .map_err(|e| AgentError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let events = async_stream::stream! {
            let mut buffer = LineBuffer::default();
            while let Some(next) = bytes.next().await {
                match next {
                    Ok(chunk) => {
                        for line in buffer.push(&chunk) {
                            if let Some(event) = parse_event_line(&line) {
                                yield Ok(event);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Agent event stream interrupted");
                        yield Err(AgentError::Interrupted(e.to_string()));
                        return;
                    }
                }
            }
            if let Some(event) = buffer.finish().as_deref().and_then(parse_event_line) {
                yield Ok(event);
            }
        };

        Ok(Box::pin(events))
    }
}

fn parse_event_line(line: &str) -> Option<AgentEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<AgentEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Skipping malformed agent event");
            None
        }
    }
}
