// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! shmimage CLI
//!
//! Publishes test frames into a shared-memory region, watches a region the
//! way a host source would, and removes stale region names.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

#[derive(Parser)]
#[command(name = "shmimage")]
#[command(author, version, about = "Shared-memory image tools", long_about = None)]
struct Cli {
    /// Also write logs to this file
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish an animated RGBA test pattern
    Publish {
        /// Source config file (YAML); its shared_id is used unless --id is given
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Shared memory id to publish into
        #[arg(long)]
        id: Option<String>,

        /// Frame width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "480")]
        height: u32,

        /// Frames per second
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Stop after this many frames (0 = run forever)
        #[arg(long, default_value = "0")]
        frames: u64,

        /// Alternate between full and half size every N frames
        #[arg(long = "resize-every", value_name = "N")]
        resize_every: Option<u64>,

        /// Remove the region name on exit if this process created it
        #[arg(long)]
        unlink: bool,
    },

    /// Poll a region like a host source and report frames and freshness
    Watch {
        /// Source config file (YAML)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Shared memory id (overrides the config file)
        #[arg(long)]
        id: Option<String>,

        /// Freshness timeout in milliseconds (overrides the config file)
        #[arg(long = "timeout", value_name = "MS")]
        timeout_ms: Option<u32>,

        /// Polling rate in ticks per second
        #[arg(long, default_value = "60")]
        tick_rate: f64,

        /// Stop after this many seconds (default: run forever)
        #[arg(long)]
        seconds: Option<f64>,
    },

    /// Remove a region name
    Remove {
        /// Shared memory id to remove
        id: String,
    },
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn setup_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = setup_logging(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Publish {
            config,
            id,
            width,
            height,
            fps,
            frames,
            resize_every,
            unlink,
        } => {
            let config = commands::resolve_config(config.as_deref(), id, None);
            commands::publish::run(commands::publish::PublishOptions {
                id: config.shared_id,
                width,
                height,
                fps,
                frames,
                resize_every,
                unlink,
            })
        }
        Commands::Watch {
            config,
            id,
            timeout_ms,
            tick_rate,
            seconds,
        } => {
            let config = commands::resolve_config(config.as_deref(), id, timeout_ms);
            commands::watch::run(config, tick_rate, seconds)
        }
        Commands::Remove { id } => commands::remove::run(&id),
    }
}
