// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the AEGIS router CLI

pub mod chat;
pub mod config;
pub mod providers;

pub use self::chat::ChatArgs;
pub use self::config::ConfigCommand;
pub use self::providers::ProvidersCommand;

use aegis_router_core::application::RouterServices;
use aegis_router_core::domain::router_config::RouterConfigManifest;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Load, validate and wire the configuration shared by every command
pub(crate) fn load_services(
    config_override: Option<PathBuf>,
) -> Result<(RouterConfigManifest, RouterServices)> {
    let manifest = RouterConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;
    let services = RouterServices::from_config(&manifest.spec)?;
    Ok((manifest, services))
}
