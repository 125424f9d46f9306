// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Health - rolling per-provider statistics
//
// Mutated only by the router after each completed attempt. Cancelled attempts
// never reach this type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling health record for a single provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub available: bool,
    /// Arithmetic mean over successful attempts, in milliseconds
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// What an update did to the availability flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityChange {
    Unchanged,
    BecameAvailable,
    BecameUnavailable,
}

impl ProviderStatus {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            available: true,
            avg_latency_ms: 0.0,
            success_rate: 0.0,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            consecutive_failures: 0,
            last_error: None,
            last_updated: Utc::now(),
        }
    }

    pub fn record_success(&mut self, latency_ms: u64) -> AvailabilityChange {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.consecutive_failures = 0;
        self.last_error = None;

        // Incremental form of the cumulative mean
        let n = self.successful_requests as f64;
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / n;

        self.refresh_success_rate();
        self.set_available(true)
    }

    /// `threshold` of 0 disables automatic demotion.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        threshold: u32,
    ) -> AvailabilityChange {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());
        self.refresh_success_rate();

        if threshold > 0 && self.consecutive_failures >= threshold {
            self.set_available(false)
        } else {
            self.last_updated = Utc::now();
            AvailabilityChange::Unchanged
        }
    }

    /// Availability override that leaves request counters untouched
    pub fn set_available(&mut self, available: bool) -> AvailabilityChange {
        self.last_updated = Utc::now();
        if self.available == available {
            return AvailabilityChange::Unchanged;
        }
        self.available = available;
        if available {
            self.consecutive_failures = 0;
            AvailabilityChange::BecameAvailable
        } else {
            AvailabilityChange::BecameUnavailable
        }
    }

    fn refresh_success_rate(&mut self) {
        self.success_rate = if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        };
    }
}
