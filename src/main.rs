//! CLI entry point for the sharelink tool.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sharelink_core::server::serve;
use sharelink_core::{AppState, ResolveOptions, load_config};
use tokio::net::TcpListener;
use tracing::{debug, info};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so `resolve` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            debug!(?config, "configuration loaded");

            let state = Arc::new(AppState::from_config(&config)?);
            let listener = TcpListener::bind(config.bind)
                .await
                .with_context(|| format!("Failed to bind {}", config.bind))?;
            info!(bind = %config.bind, "sharelink server starting");
            serve(listener, state).await
        }
        Command::Resolve { link, skip_direct } => {
            let state = AppState::from_config(&config)?;
            let options = if skip_direct {
                ResolveOptions::metadata_only()
            } else {
                ResolveOptions::default()
            };
            let share = state
                .service
                .resolve(&link, options)
                .await
                .with_context(|| format!("Failed to resolve '{link}'"))?;
            println!("{}", serde_json::to_string_pretty(&share)?);
            Ok(())
        }
    }
}
