// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_client;
pub mod event_bus;
pub mod llm;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use event_bus::{EventBus, EventBusError};
pub use registry::AdapterRegistry;
