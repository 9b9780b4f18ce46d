//! Command-line arguments for the pip client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// WebSocket URL of the notifier. Use the `/dashboard` path for price updates.
    #[clap(long, default_value = "ws://127.0.0.1:8000/")]
    pub url: String,

    /// Seconds between keep-alive pings.
    #[clap(long, default_value_t = 20)]
    pub ping_secs: u64,
}
