// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Chat command
//!
//! Sends a single turn through the orchestrator and prints the answer, the
//! streamed fragments, or the relayed agent events.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures::StreamExt;
use std::io::{Read, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use aegis_router_core::application::{
    ChatTurn, RouterOutput, StreamEvent, StreamSummary, TurnIntent, TurnOutcome,
};
use aegis_router_core::domain::llm::{LLMResponse, Message, TaskType};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Prompt text; "-" reads it from stdin
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Print fragments as they arrive
    #[arg(long)]
    pub stream: bool,

    /// Task type used for routing (default: inferred from the prompt)
    #[arg(long, value_name = "TASK")]
    pub task: Option<TaskType>,

    /// Always hand the turn to the autonomous agent
    #[arg(long, conflicts_with = "direct")]
    pub delegate: bool,

    /// Always answer directly through the router
    #[arg(long)]
    pub direct: bool,

    /// System prompt prepended to the conversation
    #[arg(long, value_name = "TEXT")]
    pub system: Option<String>,

    /// Print the final response as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatArgs {
    fn intent(&self) -> TurnIntent {
        if self.delegate {
            TurnIntent::Delegate
        } else if self.direct {
            TurnIntent::Direct
        } else {
            TurnIntent::Auto
        }
    }
}

pub async fn execute(args: ChatArgs, config_override: Option<PathBuf>) -> Result<()> {
    let (_, services) = super::load_services(config_override)?;

    let prompt = if args.prompt == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read prompt from stdin")?;
        buffer
    } else {
        args.prompt.clone()
    };

    let turn = build_turn(&args, prompt);

    // Ctrl-C cancels the in-flight provider call
    let cancel = turn.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling invocation");
            cancel.cancel();
        }
    });

    match services.orchestrator.handle(turn).await? {
        TurnOutcome::Direct(RouterOutput::Complete(response)) => {
            print_response(&response, args.json)
        }
        TurnOutcome::Direct(RouterOutput::Stream(mut stream)) => {
            let mut stdout = std::io::stdout();
            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::Fragment(text) => {
                        write!(stdout, "{}", text)?;
                        stdout.flush()?;
                    }
                    StreamEvent::Done(summary) => {
                        writeln!(stdout)?;
                        print_stream_summary(&summary, args.json)?;
                    }
                }
            }
            Ok(())
        }
        TurnOutcome::Delegated(mut events) => {
            println!("{}", "Delegated to autonomous agent".cyan().bold());
            while let Some(event) = events.next().await {
                let event = event.context("Autonomous agent stopped before finishing")?;
                if args.json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    println!(
                        "{} {} {}",
                        event.timestamp.format("%H:%M:%S").to_string().dimmed(),
                        event.kind.cyan(),
                        event.data
                    );
                }
            }
            Ok(())
        }
    }
}

pub fn build_turn(args: &ChatArgs, prompt: String) -> ChatTurn {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(prompt));

    let mut turn = ChatTurn::new(messages)
        .with_intent(args.intent())
        .streaming(args.stream)
        .with_cancel(CancellationToken::new());
    if let Some(task) = args.task {
        turn = turn.with_task_hint(task);
    }
    turn
}

fn print_response(response: &LLMResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    println!("{}", response.content);
    println!();
    println!(
        "{}",
        summary_line(
            &response.provider,
            response.model.as_deref(),
            response.latency_ms,
            response.fallback_used
        )
        .dimmed()
    );
    Ok(())
}

fn print_stream_summary(summary: &StreamSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!(
            "{}",
            summary_line(
                &summary.provider,
                summary.model.as_deref(),
                summary.latency_ms,
                summary.fallback_used
            )
            .dimmed()
        );
    }
    Ok(())
}

fn summary_line(
    provider: &str,
    model: Option<&str>,
    latency_ms: u64,
    fallback_used: bool,
) -> String {
    let mut line = format!(
        "{} ({}) in {} ms",
        provider,
        model.unwrap_or("default model"),
        latency_ms
    );
    if fallback_used {
        line.push_str(", fallback");
    }
    line
}
