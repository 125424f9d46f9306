// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use aegis_router_core::domain::router_config::RouterConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./aegis-router.yaml)
        #[arg(short, long, default_value = "./aegis-router.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = RouterConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. AEGIS_ROUTER_CONFIG_PATH: {}",
            std::env::var("AEGIS_ROUTER_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./aegis-router.yaml");
        println!("  4. ~/.aegis/router.yaml");
        println!("  5. /etc/aegis/router.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&redacted(config))?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "LLM Providers:".bold());
    for provider in &config.spec.llm_providers {
        println!("  {} ({})", provider.name.bold(), provider.provider_type);
        println!("    Endpoint: {}", provider.endpoint());
        println!("    Model: {}", provider.model);
        if let Some(key) = &provider.api_key {
            println!("    API key: {}", describe_key(key));
        }
    }
    println!();

    println!("{}", "Router:".bold());
    println!("  Failure threshold: {}", config.spec.router.failure_threshold);
    println!("  Event capacity: {}", config.spec.router.event_capacity);
    println!();

    println!("{}", "Orchestrator:".bold());
    println!("  Agent flow: {}", config.spec.orchestrator.agent_flow);
    println!(
        "  Agent endpoint: {}",
        config
            .spec
            .orchestrator
            .agent_endpoint
            .as_deref()
            .unwrap_or("(none)")
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = RouterConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

/// Literal keys never leave the process; env references are kept
fn redacted(mut config: RouterConfigManifest) -> RouterConfigManifest {
    for provider in &mut config.spec.llm_providers {
        if let Some(key) = provider.api_key.as_mut() {
            if !key.starts_with("env:") {
                *key = "<redacted>".to_string();
            }
        }
    }
    config
}

fn describe_key(key: &str) -> String {
    match key.strip_prefix("env:") {
        Some(var) => format!("from ${}", var),
        None => "<set inline>".to_string(),
    }
}
