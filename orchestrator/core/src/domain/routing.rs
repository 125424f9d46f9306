// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Task Routing - static task-to-provider priority table
//
// Loaded from configuration at startup and consumed read-only by the router.

use crate::domain::llm::TaskType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry in a task's fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRoute {
    /// Registered provider name
    pub provider: String,

    /// Model override for this task; the provider default is used otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderRoute {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRouting {
    routes: HashMap<TaskType, Vec<ProviderRoute>>,
}

impl TaskRouting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper, mostly used by tests and bootstrap code
    pub fn route(mut self, task_type: TaskType, chain: Vec<ProviderRoute>) -> Self {
        self.routes.insert(task_type, chain);
        self
    }

    /// Ordered candidates for a task; empty when nothing is configured
    pub fn candidates(&self, task_type: TaskType) -> &[ProviderRoute] {
        self.routes.get(&task_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskType, &Vec<ProviderRoute>)> {
        self.routes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl From<HashMap<TaskType, Vec<ProviderRoute>>> for TaskRouting {
    fn from(routes: HashMap<TaskType, Vec<ProviderRoute>>) -> Self {
        Self { routes }
    }
}
