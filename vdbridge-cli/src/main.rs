// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! vdbridge CLI
//!
//! Developer harness: load a guest module, call its entry export and print
//! the DOM subtree it returns.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;
use vdbridge_core::Document;
use vdbridge_runtime::{ModuleLoader, RuntimeConfig, DEFAULT_ENTRY, IMPORTS};
use vdbridge_telemetry::{init_tracing, LogFormat, TelemetryConfig};

#[derive(Parser)]
#[command(name = "vdbridge")]
#[command(about = "vdbridge - run WebAssembly guests against a host DOM", long_about = None)]
struct Cli {
    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a guest and render the tree returned by its entry export
    Run {
        /// Path or http(s) URL of the guest module
        source: String,

        /// Export to call; must have type () -> i32
        #[arg(long, default_value = DEFAULT_ENTRY)]
        entry: String,

        /// Runtime configuration file (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also print the DOM mutation journal as JSON
        #[arg(long)]
        journal: bool,
    },

    /// List the imports a guest can link against
    Imports {
        /// Runtime configuration file (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

async fn run(
    source: &str,
    entry: &str,
    config: RuntimeConfig,
    journal: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let import_module = config.import_module.clone();
    let loader = ModuleLoader::new(config).context("Failed to create module loader")?;

    let mut module = if is_url(source) {
        loader
            .load_from_url_cancellable(source, Document::with_journal(journal), &cancel)
            .await
    } else {
        let bytes = tokio::fs::read(source)
            .await
            .with_context(|| format!("Failed to read {}", source))?;
        loader
            .load_from_bytes_cancellable(&bytes, Document::with_journal(journal), &cancel)
            .await
    }
    .with_context(|| format!("Failed to load guest from {}", source))?;

    info!(entry, import_module = %import_module, "calling entry export");
    let handle = module
        .call_handle_export(entry)
        .await
        .with_context(|| format!("Export `{}` failed", entry))?;

    if handle.is_null() {
        match module.take_last_error() {
            Some(err) => bail!("Export `{}` returned no node: {}", entry, err),
            None => bail!("Export `{}` returned the null handle", entry),
        }
    }

    println!("{}", module.render_html(handle)?);

    if journal {
        let mutations = module.bridge().dom().journal();
        println!("{}", serde_json::to_string_pretty(mutations)?);
    }

    let metrics = module.metrics();
    info!(
        host_calls = metrics.host_call_count,
        errors = metrics.error_count,
        live_handles = module.bridge().table().live_count(),
        "guest finished"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    match cli.command {
        Commands::Imports { config } => {
            let module = load_config(config.as_deref())?.import_module;
            for (name, signature) in IMPORTS {
                println!("{}.{} {}", module, name, signature);
            }
        }

        Commands::Run {
            source,
            entry,
            config,
            journal,
        } => {
            let config = load_config(config.as_deref())?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            run(&source, &entry, config, journal, cancel).await?;
        }
    }

    Ok(())
}
