// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AEGIS Router Core
//!
//! Task-aware LLM routing with provider fallback, rolling provider health and
//! a chat orchestrator that either answers a turn directly or delegates it to
//! an autonomous agent.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Library consumed by the `aegis-router` CLI and embedding services

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
