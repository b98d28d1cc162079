//! Plugboard CLI entry point.
//!
//! Provides `device-key` for inspecting how a device would be identified and
//! `replay` for feeding a recorded event stream through the interface
//! manager and printing the resulting changes and compiled policy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

use plugboard::config::PlugboardConfig;
use plugboard::context::Context;
use plugboard::hotplug::{default_device_key, DeviceEvent, DeviceInfo};
use plugboard::interfaces::Backend;
use plugboard::manager::InterfaceManager;
use plugboard::snap::{PlugInfo, SlotInfo};
use plugboard::state::StateDb;

/// Plugboard: capability connections and hotplug slot lifecycle.
#[derive(Parser)]
#[command(name = "plugboard", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Print the default device key for a set of udev properties.
    DeviceKey {
        /// Properties as `KEY=VALUE`.
        #[arg(required = true)]
        props: Vec<String>,
    },
    /// Replay recorded device events and print changes and policy.
    Replay {
        /// JSON file with `plugs`, `slots` and `events`.
        input: PathBuf,
        /// Backends to print; all when omitted.
        #[arg(long = "backend")]
        backends: Vec<Backend>,
        /// Also write JSON logs to the configured logs directory.
        #[arg(long)]
        log_file: bool,
    },
}

/// Replay input document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplayInput {
    plugs: Vec<PlugInfo>,
    slots: Vec<SlotInfo>,
    events: Vec<DeviceEvent>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = plugboard::logging::with_startup_logging(PlugboardConfig::load)
        .context("failed to load configuration")?;

    match cli.command {
        Command::DeviceKey { props } => {
            plugboard::logging::init_cli(&config.logging.level);
            handle_device_key(&props)
        }
        Command::Replay {
            input,
            backends,
            log_file,
        } => {
            let _guard = if log_file {
                Some(plugboard::logging::init_production(
                    &config.paths.logs_dir_path(),
                    &config.logging.level,
                )?)
            } else {
                plugboard::logging::init_cli(&config.logging.level);
                None
            };
            handle_replay(&config, &input, &backends).await
        }
    }
}

/// Print the default key; exits with an error when the device cannot be
/// identified.
fn handle_device_key(props: &[String]) -> anyhow::Result<()> {
    let mut device = DeviceInfo::new("");
    for prop in props {
        let (key, value) = prop
            .split_once('=')
            .with_context(|| format!("expected KEY=VALUE, got {prop:?}"))?;
        device = match key {
            "DEVPATH" => DeviceInfo {
                devpath: value.to_owned(),
                ..device
            },
            _ => device.with_attr(key, value),
        };
    }
    let key = default_device_key(&device);
    anyhow::ensure!(!key.is_empty(), "not enough identifying properties for a device key");
    println!("{key}");
    Ok(())
}

async fn handle_replay(
    config: &PlugboardConfig,
    input: &Path,
    backends: &[Backend],
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let doc: ReplayInput = serde_json::from_str(&raw)
        .with_context(|| format!("invalid replay input {}", input.display()))?;

    let ctx = Context::from_config(config)?;
    let manager = InterfaceManager::new(&ctx);

    for plug in doc.plugs {
        let reference = plug.reference();
        if let Err(e) = manager.add_plug(plug).await {
            warn!(plug = %reference, error = %e, "rejected plug declaration");
        }
    }
    for slot in doc.slots {
        let reference = slot.reference();
        if let Err(e) = manager.add_slot(slot).await {
            warn!(slot = %reference, error = %e, "rejected slot declaration");
        }
    }

    let db_path = config.paths.state_db_path();
    let db = StateDb::open(&db_path).await?;
    manager.restore(&db).await?;

    for event in &doc.events {
        manager.handle_event(event).await;
    }
    let changes = manager.run_pending_changes().await;
    info!(changes = changes.len(), "replay finished");

    let compiled = manager.compile_all().await;
    let mut policy = BTreeMap::new();
    for (backend, result) in compiled {
        if !backends.is_empty() && !backends.contains(&backend) {
            continue;
        }
        let value = match result {
            Ok(snippets) => serde_json::json!({ "snippets": snippets }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        policy.insert(backend.as_str(), value);
    }

    let report = serde_json::json!({ "changes": changes, "policy": policy });
    println!("{}", serde_json::to_string_pretty(&report)?);

    manager
        .checkpoint(&db)
        .await
        .with_context(|| format!("failed to persist state to {}", db_path.display()))?;
    Ok(())
}
