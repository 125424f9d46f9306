// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod bootstrap;
pub mod chat_orchestrator;
pub mod provider_health;
pub mod router;

// Re-export use cases for convenience
pub use bootstrap::RouterServices;
pub use chat_orchestrator::{
    ChatOrchestrator, ChatTurn, OrchestratorError, TurnDecision, TurnIntent, TurnMode, TurnOutcome,
};
pub use router::{
    LlmRouter, ProviderFailure, ResponseStream, RouteRequest, RouterError, RouterOutput,
    StreamEvent, StreamSummary,
};
