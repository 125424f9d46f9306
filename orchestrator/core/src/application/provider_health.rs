// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Health Tracker - concurrent ProviderStatus table
//
// Every read-modify-write of a provider's statistics happens while holding
// that provider's DashMap shard lock. Events and metrics are published after
// the lock is released.

use crate::domain::events::{Event, EventType};
use crate::domain::llm::LLMError;
use crate::domain::provider_status::{AvailabilityChange, ProviderStatus};
use crate::infrastructure::event_bus::EventBus;
use dashmap::DashMap;
use serde_json::json;
use tracing::{info, warn};

pub struct ProviderHealth {
    statuses: DashMap<String, ProviderStatus>,
    failure_threshold: u32,
    events: EventBus,
}

impl ProviderHealth {
    pub fn new(failure_threshold: u32, events: EventBus) -> Self {
        Self {
            statuses: DashMap::new(),
            failure_threshold,
            events,
        }
    }

    /// Providers without a record yet are considered available
    pub fn is_available(&self, provider: &str) -> bool {
        self.statuses
            .get(provider)
            .map(|status| status.available)
            .unwrap_or(true)
    }

    pub fn status(&self, provider: &str) -> Option<ProviderStatus> {
        self.statuses.get(provider).map(|status| status.clone())
    }

    /// Snapshot of every tracked provider, sorted by name
    pub fn statuses(&self) -> Vec<ProviderStatus> {
        let mut all: Vec<ProviderStatus> =
            self.statuses.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.provider.cmp(&b.provider));
        all
    }

    pub fn record_success(&self, provider: &str, latency_ms: u64) -> ProviderStatus {
        let (change, snapshot) = {
            let mut entry = self
                .statuses
                .entry(provider.to_string())
                .or_insert_with(|| ProviderStatus::new(provider));
            let change = entry.record_success(latency_ms);
            (change, entry.clone())
        };

        metrics::counter!("aegis_router_attempts_total", "provider" => provider.to_string(), "outcome" => "success")
            .increment(1);
        metrics::histogram!("aegis_router_attempt_latency_seconds", "provider" => provider.to_string())
            .record(latency_ms as f64 / 1000.0);

        self.publish_metrics(&snapshot, "success", None);
        self.publish_change(&snapshot, change, "request succeeded");
        snapshot
    }

    pub fn record_failure(&self, provider: &str, error: &LLMError) -> ProviderStatus {
        let (change, snapshot) = {
            let mut entry = self
                .statuses
                .entry(provider.to_string())
                .or_insert_with(|| ProviderStatus::new(provider));
            let change = entry.record_failure(error.to_string(), self.failure_threshold);
            (change, entry.clone())
        };

        metrics::counter!("aegis_router_attempts_total", "provider" => provider.to_string(), "outcome" => "failure")
            .increment(1);

        self.publish_metrics(&snapshot, "failure", Some(error));
        if change == AvailabilityChange::BecameUnavailable {
            warn!(
                provider = %provider,
                consecutive_failures = snapshot.consecutive_failures,
                "Provider marked unavailable"
            );
        }
        self.publish_change(&snapshot, change, "consecutive failure threshold reached");
        snapshot
    }

    /// Availability override; request counters stay untouched
    pub fn set_available(&self, provider: &str, available: bool, reason: &str) -> ProviderStatus {
        let (change, snapshot) = {
            let mut entry = self
                .statuses
                .entry(provider.to_string())
                .or_insert_with(|| ProviderStatus::new(provider));
            let change = entry.set_available(available);
            (change, entry.clone())
        };

        if change != AvailabilityChange::Unchanged {
            info!(provider = %provider, available, reason, "Provider availability changed");
        }
        self.publish_change(&snapshot, change, reason);
        snapshot
    }

    fn publish_metrics(&self, status: &ProviderStatus, outcome: &str, error: Option<&LLMError>) {
        let mut event = Event::new(EventType::MetricsUpdate)
            .with("provider", status.provider.as_str())
            .with("outcome", outcome)
            .with("available", status.available)
            .with("success_rate", status.success_rate)
            .with("avg_latency_ms", status.avg_latency_ms)
            .with("total_requests", status.total_requests)
            .with("successful_requests", status.successful_requests)
            .with("failed_requests", status.failed_requests);
        if let Some(error) = error {
            event = event.with("error", error.to_string());
        }
        self.events.publish(event);
    }

    fn publish_change(&self, status: &ProviderStatus, change: AvailabilityChange, reason: &str) {
        if change == AvailabilityChange::Unchanged {
            return;
        }
        self.events.publish(
            Event::new(EventType::ServiceStatusChanged)
                .with("provider", status.provider.as_str())
                .with("available", status.available)
                .with("reason", reason)
                .with("consecutive_failures", json!(status.consecutive_failures)),
        );
    }
}
