// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model of the router: task types, messages, provider contracts,
//! health records, routing tables and lifecycle events.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and interfaces shared by every other layer

pub mod adapter;
pub mod agent;
pub mod events;
pub mod llm;
pub mod provider_status;
pub mod router_config;
pub mod routing;
