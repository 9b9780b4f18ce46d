//! FX pip-movement notifier.
//!
//! This binary polls current quotes for a configured set of FX instruments, converts each
//! move against a per-instrument baseline into pips, and tells connected WebSocket
//! subscribers when a move crosses one of three thresholds. Internally it wires together
//! these building blocks:
//!
//! - `SimulatedFeed`: the `PriceFeed` quoting every instrument (a random walk, so the
//!   service runs without a trading terminal).
//! - `SamplingLoop`: owns one `SymbolTracker` per instrument, samples all of them once
//!   per poll interval and turns threshold crossings into `MovementEvent`s.
//! - `Broadcaster`: the live subscriber set of a channel (speech or dashboard) with
//!   bounded, timeout-limited fan-out.
//! - `SubscriberServer`: accepts WebSocket connections and routes each one to a channel
//!   by its request path.
//!
//! Startup order:
//! - settings are assembled from defaults, an optional JSON file and CLI flags, then
//!   validated;
//! - every configured symbol is checked against the feed; an unknown symbol is fatal;
//! - the listener is bound; a bind failure is fatal;
//! - the start announcement is broadcast and sampling begins.
//!
//! Concurrency and shutdown:
//! - The accept loop runs on its own thread; each connection gets a handshake thread and,
//!   once registered, a writer thread owned by its broadcaster.
//! - The sampling loop runs on the main thread and waits on a crossbeam `select!` between
//!   its ticker and the shutdown channel.
//! - Ctrl-C (or SIGTERM) fires the shutdown channel; the loop finishes its current cycle,
//!   then both broadcasters send close frames and wait for their writers for the
//!   configured grace period.
//!
//! Network protocol (high-level):
//! - Bind address: `0.0.0.0:8000` by default (see `TransportConfig`).
//! - `ws://host:port/` (also `/direct-speech`, `/direct`): JSON speech messages
//!   `{"text", "role", "emotion", "type": "message"}`.
//! - `ws://host:port/dashboard`: an `init` message on connect, then a `price_update`
//!   for every sample.
#![warn(missing_docs)]
use crate::args::Args;
use crate::broadcaster::Broadcaster;
use crate::config::Settings;
use crate::feed::{PriceFeed, SimulatedFeed, verify_symbols};
use crate::sampler::SamplingLoop;
use crate::server::SubscriberServer;
use crate::status::StatusBoard;
use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info};
use pip_common::{PipError, Result};
use std::sync::Arc;
use std::thread;

mod args;
mod broadcaster;
mod config;
mod feed;
pub mod model;
mod sampler;
mod server;
mod status;

fn main() -> Result<(), PipError> {
    init_logger();
    if let Err(e) = run(Args::parse()) {
        error!("Fatal: {}", e);
        return Err(e);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let settings = Settings::from_args(&args)?;
    let instruments = settings.instrument_configs();
    info!(
        "Loaded {} instruments, poll interval {:?}, thresholds {}/{}/{} pips",
        instruments.len(),
        settings.poll_interval(),
        settings.thresholds.small.pips,
        settings.thresholds.medium.pips,
        settings.thresholds.large.pips
    );

    let feed: Arc<dyn PriceFeed> =
        Arc::new(SimulatedFeed::new(&instruments, args.volatility, args.seed));
    verify_symbols(feed.as_ref(), &instruments)?;

    let board = StatusBoard::new(&instruments);
    let speech = Broadcaster::from_transport("speech", &settings.transport);
    let dashboard = Broadcaster::from_transport("dashboard", &settings.transport);

    let server =
        SubscriberServer::bind(&settings, speech.clone(), dashboard.clone(), board.clone())?;
    thread::Builder::new()
        .name("acceptor".to_string())
        .spawn(move || server.accept_loop())?;

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Shutdown requested");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| PipError::Config(format!("cannot install signal handler: {}", e)))?;

    let sampler = SamplingLoop::new(&settings, feed, speech.clone(), dashboard.clone(), board);
    sampler.announce_start();
    sampler.run(shutdown_rx);

    let grace = settings.transport.shutdown_grace();
    speech.shutdown(grace);
    dashboard.shutdown(grace);
    info!("Notifier stopped");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
