//! Periodic sampling of every instrument.
//!
//! One cycle:
//!
//! 1. quotes for all instruments are fetched concurrently (scoped threads, one per
//!    symbol) and joined;
//! 2. each quote is fed to its tracker in instrument order;
//! 3. every sample is published to the dashboard channel and recorded on the status
//!    board;
//! 4. every movement event is encoded and broadcast on the speech channel.
//!
//! A symbol whose quote fails is logged and skipped for the cycle; its tracker keeps
//! its baseline and the other symbols are unaffected. Cycles are paced by a
//! `crossbeam_channel::tick` so a slow cycle drops ticks instead of queueing them.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, select, tick};
use log::{debug, error, info, warn};
use pip_common::message::{DashboardMessage, Emotion, SpeechMessage};
use pip_common::{PipError, Result};

use crate::broadcaster::Broadcaster;
use crate::config::{Settings, ThresholdConfig};
use crate::feed::PriceFeed;
use crate::model::price::{PriceSample, Tick};
use crate::model::tracker::{Observation, SymbolTracker};
use crate::status::StatusBoard;

/// Counts for one sampling cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Symbols sampled successfully.
    pub sampled: usize,
    /// Symbols skipped because their quote failed.
    pub skipped: usize,
    /// Movement events broadcast.
    pub events: usize,
}

/// Owns the trackers and drives them from the feed.
pub struct SamplingLoop {
    feed: Arc<dyn PriceFeed>,
    trackers: Vec<SymbolTracker>,
    thresholds: ThresholdConfig,
    interval: Duration,
    speech: Broadcaster,
    dashboard: Broadcaster,
    board: StatusBoard,
}

impl SamplingLoop {
    /// Create a loop with one fresh tracker per configured instrument.
    pub fn new(
        settings: &Settings,
        feed: Arc<dyn PriceFeed>,
        speech: Broadcaster,
        dashboard: Broadcaster,
        board: StatusBoard,
    ) -> Self {
        Self {
            feed,
            trackers: settings
                .instrument_configs()
                .into_iter()
                .map(SymbolTracker::new)
                .collect(),
            thresholds: settings.thresholds.clone(),
            interval: settings.poll_interval(),
            speech,
            dashboard,
            board,
        }
    }

    /// Tell speech subscribers which instruments are being watched.
    pub fn announce_start(&self) {
        let names: Vec<&str> = self
            .trackers
            .iter()
            .map(|tracker| tracker.instrument().display_name())
            .collect();
        let message = SpeechMessage::system(
            format!("MT5 FX価格監視開始: {}", names.join(", ")),
            Emotion::Happy,
        );
        match message.to_json() {
            Ok(json) => {
                self.speech.broadcast(&json);
            }
            Err(e) => error!("Failed to encode start message: {}", e),
        }
        info!("Watching {} instruments: {}", names.len(), names.join(", "));
    }

    /// Run cycles until `shutdown` fires or its sender is dropped.
    ///
    /// The first cycle runs immediately.
    pub fn run(mut self, shutdown: Receiver<()>) {
        let ticker = tick(self.interval);
        info!("Sampling every {:?}", self.interval);
        self.run_cycle();

        loop {
            select! {
                recv(shutdown) -> _ => {
                    info!("Sampling loop stopped");
                    break;
                },
                recv(ticker) -> _ => {
                    self.run_cycle();
                }
            }
        }
    }

    /// Sample every instrument once.
    pub fn run_cycle(&mut self) -> CycleSummary {
        let quotes = self.fetch_all();
        let Self {
            trackers,
            thresholds,
            speech,
            dashboard,
            board,
            ..
        } = self;

        let mut summary = CycleSummary::default();
        for (tracker, quote) in trackers.iter_mut().zip(quotes) {
            let symbol = tracker.instrument().symbol.clone();
            let sample = match quote.and_then(|tick| PriceSample::from_tick(&symbol, &tick)) {
                Ok(sample) => sample,
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("Skipping {} this cycle: {}", symbol, e);
                    } else {
                        error!("Skipping {} this cycle: {}", symbol, e);
                    }
                    summary.skipped += 1;
                    continue;
                }
            };
            summary.sampled += 1;

            let observation = tracker.observe(&sample, thresholds);
            let (base_price, pips) = match &observation {
                Observation::Initialized(baseline) => {
                    info!("{}: baseline set at {}", symbol, baseline.price);
                    (baseline.price, 0.0)
                }
                Observation::Held { baseline, pips } => (baseline.price, *pips),
                Observation::Moved(event) => (event.baseline, event.pips),
            };

            let current_base = tracker.baseline().map_or(sample.bid, |b| b.price);
            board.record(&symbol, sample.bid, current_base);

            let update = DashboardMessage::PriceUpdate {
                symbol: symbol.clone(),
                reading: tracker.instrument().reading.clone(),
                price: sample.bid,
                base_price,
                pips_change: pips.abs(),
            };
            match update.to_json() {
                Ok(json) => {
                    dashboard.broadcast(&json);
                }
                Err(e) => error!("Failed to encode price update for {}: {}", symbol, e),
            }

            if let Some(event) = observation.event() {
                info!(
                    "{} {:?} move: {} pips {} ({} -> {})",
                    symbol,
                    event.tier,
                    event.display_pips(),
                    event.direction.label(),
                    event.baseline,
                    event.price
                );
                match event.to_message().to_json() {
                    Ok(json) => {
                        let report = speech.broadcast(&json);
                        debug!(
                            "{}: delivered to {}, dropped {}",
                            symbol, report.delivered, report.dropped
                        );
                        summary.events += 1;
                    }
                    Err(e) => error!("Failed to encode event for {}: {}", symbol, e),
                }
            }
        }
        summary
    }

    fn fetch_all(&self) -> Vec<Result<Tick>> {
        let feed: &dyn PriceFeed = &*self.feed;
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .trackers
                .iter()
                .map(|tracker| {
                    let symbol = tracker.instrument().symbol.as_str();
                    (symbol, scope.spawn(move || feed.quote(symbol)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(symbol, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(PipError::feed(symbol, "quote thread panicked")))
                })
                .collect()
        })
    }
}
