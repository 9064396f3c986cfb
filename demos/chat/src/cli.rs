//! Command-line argument parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Line chat over an rfcomm-link.
#[derive(Parser, Debug, Clone)]
#[command(name = "rfcomm-chat")]
#[command(about = "Chat with one peer over a TCP-backed rfcomm link")]
#[command(version)]
pub struct Cli {
    /// Link configuration file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub role: RoleCommand,
}

/// Which side of the link to play.
#[derive(Subcommand, Debug, Clone)]
pub enum RoleCommand {
    /// Wait for a peer to connect.
    Host {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:7710")]
        listen: SocketAddr,
    },
    /// Connect to a host.
    Client {
        /// Host endpoint.
        #[arg(long, default_value = "127.0.0.1:7710")]
        peer: SocketAddr,

        /// Hardware address the host is paired under.
        #[arg(long, default_value = "00:00:00:00:00:01")]
        address: String,
    },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
