// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provider inspection commands
//!
//! Commands: list, health

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use aegis_router_core::domain::llm::TaskType;

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// List configured providers and the routing table
    List,

    /// Check every enabled provider
    Health {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(
    command: ProvidersCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ProvidersCommand::List => list(config_override).await,
        ProvidersCommand::Health { json } => health(config_override, json).await,
    }
}

async fn list(config_override: Option<PathBuf>) -> Result<()> {
    let (manifest, _) = super::load_services(config_override)?;
    let spec = &manifest.spec;

    println!("{}", "LLM Providers:".bold());
    if spec.llm_providers.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for provider in &spec.llm_providers {
        let state = if provider.enabled { "enabled".green() } else { "disabled".yellow() };
        println!("  {} ({}) [{}]", provider.name.bold(), provider.provider_type, state);
        println!("    Endpoint: {}", provider.endpoint());
        println!("    Model: {}", provider.model);
        println!("    Timeout: {}s", provider.timeout_secs);
    }
    println!();

    println!("{}", "Task Routing:".bold());
    for task_type in TaskType::ALL {
        let chain = spec.task_routing.candidates(task_type);
        if chain.is_empty() {
            println!("  {}: {}", task_type, "(no route)".dimmed());
            continue;
        }
        let rendered: Vec<String> = chain
            .iter()
            .map(|route| match &route.model {
                Some(model) => format!("{}:{}", route.provider, model),
                None => route.provider.clone(),
            })
            .collect();
        println!("  {}: {}", task_type, rendered.join(" → "));
    }

    Ok(())
}

async fn health(config_override: Option<PathBuf>, json: bool) -> Result<()> {
    let (_, services) = super::load_services(config_override)?;
    let results = services.router.health_check_all().await;

    if json {
        let report: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, result)| {
                serde_json::json!({
                    "provider": name,
                    "healthy": result.is_ok(),
                    "error": result.as_ref().err().map(|e| e.to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", "Provider health:".bold());
        if results.is_empty() {
            println!("  {}", "(no providers registered)".dimmed());
        }
        for (name, result) in &results {
            match result {
                Ok(()) => println!("  {} {}", "✓".green(), name),
                Err(e) => println!("  {} {} - {}", "✗".red(), name, e),
            }
        }
    }

    let unhealthy = results.iter().filter(|(_, r)| r.is_err()).count();
    if unhealthy > 0 {
        anyhow::bail!("{} of {} provider(s) unhealthy", unhealthy, results.len());
    }
    Ok(())
}
