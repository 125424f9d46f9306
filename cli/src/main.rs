// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Router CLI
//!
//! The `aegis-router` binary drives the routing core from a terminal.
//!
//! ## Commands
//!
//! - `aegis-router chat <PROMPT>` - Send one chat turn (direct or delegated)
//! - `aegis-router providers list|health` - Inspect configured providers
//! - `aegis-router config show|validate|generate` - Configuration management

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use aegis_router::commands::{self, ChatArgs, ConfigCommand, ProvidersCommand};
use aegis_router::telemetry::{self, LogFormat};

/// AEGIS Router - task-aware LLM routing with provider fallback
#[derive(Parser)]
#[command(name = "aegis-router")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AEGIS_ROUTER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AEGIS_ROUTER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format (text, json)
    #[arg(long, global = true, env = "AEGIS_ROUTER_LOG_FORMAT")]
    log_format: Option<String>,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "AEGIS_ROUTER_METRICS_PORT")]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a chat turn through the orchestrator
    #[command(name = "chat")]
    Chat(ChatArgs),

    /// Provider inspection
    #[command(name = "providers")]
    Providers {
        #[command(subcommand)]
        command: ProvidersCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let observability = telemetry::peek_observability(cli.config.as_ref());
    let logging = observability.as_ref().and_then(|o| o.logging.clone());
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "warn".to_string());
    let format = match cli.log_format.as_deref().or(logging.as_ref().map(|l| l.format.as_str())) {
        Some(value) => LogFormat::parse(value)?,
        None => LogFormat::Text,
    };
    telemetry::init_logging(&level, format)?;

    let metrics_port = cli.metrics_port.or_else(|| {
        observability
            .as_ref()
            .and_then(|o| o.metrics.as_ref())
            .filter(|m| m.enabled)
            .map(|m| m.port)
    });
    if let Some(port) = metrics_port {
        telemetry::init_metrics(port)?;
    }

    match cli.command {
        Commands::Chat(args) => commands::chat::execute(args, cli.config).await,
        Commands::Providers { command } => {
            commands::providers::handle_command(command, cli.config).await
        }
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}
