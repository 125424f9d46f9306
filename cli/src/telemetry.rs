// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Logging and metrics setup for the CLI process

use aegis_router_core::domain::router_config::{ObservabilityConfig, RouterConfigManifest};
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "compact" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("Unknown log format '{}'. Expected 'text' or 'json'", other),
        }
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

/// Serve the router metrics on `0.0.0.0:<port>/metrics`
pub fn init_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to start metrics exporter on {}", addr))?;

    metrics::describe_counter!(
        "aegis_router_attempts_total",
        "Provider attempts by provider and outcome"
    );
    metrics::describe_histogram!(
        "aegis_router_attempt_latency_seconds",
        metrics::Unit::Seconds,
        "Latency of successful provider attempts"
    );

    tracing::info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Observability section of the config that would be loaded, read before
/// logging is up. Any problem here is left for the command to report.
pub fn peek_observability(config_override: Option<&PathBuf>) -> Option<ObservabilityConfig> {
    let path = config_override
        .cloned()
        .or_else(RouterConfigManifest::discover_config)?;
    RouterConfigManifest::from_yaml_file(path)
        .ok()
        .and_then(|manifest| manifest.spec.observability)
}
