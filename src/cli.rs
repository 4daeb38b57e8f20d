//! CLI argument definitions using clap derive macros.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resolve cloud-storage share links into direct download URLs.
///
/// Sharelink negotiates the share page, its token and listing API on the
/// caller's behalf, and can serve the results over HTTP.
#[derive(Parser, Debug)]
#[command(name = "sharelink")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (defaults to $XDG_CONFIG_HOME/sharelink/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Listen address (overrides config and SHARELINK_BIND)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
    /// Resolve one share link and print its metadata as JSON
    Resolve {
        /// Share link to resolve
        link: String,

        /// Stop after the listing step (no direct link)
        #[arg(long)]
        skip_direct: bool,
    },
}
