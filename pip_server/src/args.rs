//! Command-line arguments for the pip notifier.
//!
//! Flags override the corresponding values loaded from the settings file. See `main`
//! for the order in which settings are assembled.
use clap::Parser;
use std::path::PathBuf;

/// Parsed command-line arguments.
#[derive(Debug, Default, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to a JSON settings file. Built-in defaults are used when omitted.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Host to bind the WebSocket listener on.
    #[clap(long)]
    pub host: Option<String>,

    /// Port to bind the WebSocket listener on.
    #[clap(long)]
    pub port: Option<u16>,

    /// Poll interval in seconds.
    #[clap(long)]
    pub interval: Option<f64>,

    /// Seed for the simulated price feed (random when omitted).
    #[clap(long)]
    pub seed: Option<u64>,

    /// Largest step of the simulated feed, in pips per quote.
    #[clap(long, default_value_t = 2.0)]
    pub volatility: f64,
}
