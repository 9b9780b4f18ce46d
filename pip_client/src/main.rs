//! Pip Client: a WebSocket client that connects to the pip notifier and prints what it
//! receives. On the speech channel that is the greeting, the start announcement and every
//! movement notification; on the dashboard channel the `init` snapshot and a price update
//! per sample.
//!
//! Usage example (CLI):
//! ```bash
//! pip_client --url ws://192.168.0.10:8000/
//! pip_client --url ws://192.168.0.10:8000/dashboard --ping-secs 10
//! ```
//!
//! Set `RUST_LOG=debug` to also see keep-alive traffic.
#![warn(missing_docs)]
mod args;
mod listener;

use crate::args::Args;
use crate::listener::Listener;
use clap::Parser;
use log::info;
use pip_common::PipError;
use pip_common::Result;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;

/// How long a single read may block before the loop checks for shutdown.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> Result<(), PipError> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| PipError::Config(format!("cannot install Ctrl+C handler: {}", e)))?;
    }

    info!("Connecting to {}", args.url.trim());
    let (socket, response) = tungstenite::connect(args.url.trim())?;
    info!("Connected (HTTP {})", response.status());
    if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
    }

    info!("Client is running. Press Ctrl+C to exit.");
    Listener::new(socket, Duration::from_secs(args.ping_secs.max(1))).run(&shutdown)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
