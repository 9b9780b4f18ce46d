//! Price feed abstraction and the built-in simulated feed.
//!
//! The notifier only needs two things from a trading terminal: whether it offers a
//! symbol, and the current quote for it. `PriceFeed` captures exactly that so any
//! terminal bridge can be plugged in.
//!
//! `SimulatedFeed` lets the service run without a terminal. Each instrument follows a
//! random walk: every quote moves the bid by a uniformly sampled amount within
//! `±max_step_pips` pips, rounded to the instrument's quoted precision, with the ask
//! a fixed spread above.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, info};
use pip_common::{PipError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::InstrumentConfig;
use crate::model::pip::pip_size;
use crate::model::price::Tick;

/// Source of current quotes.
pub trait PriceFeed: Send + Sync {
    /// Whether the feed can quote `symbol` at all.
    fn knows_symbol(&self, symbol: &str) -> bool;

    /// Current quote for `symbol`, or `PipError::FeedUnavailable`.
    fn quote(&self, symbol: &str) -> Result<Tick>;
}

/// Fail fast if any configured instrument is unknown to the feed.
pub fn verify_symbols(feed: &dyn PriceFeed, instruments: &[InstrumentConfig]) -> Result<()> {
    for instrument in instruments {
        if !feed.knows_symbol(&instrument.symbol) {
            return Err(PipError::InvalidSymbolConfig(instrument.symbol.clone()));
        }
        debug!("{}: available", instrument.symbol);
    }
    Ok(())
}

/// Spread between bid and ask of simulated quotes, in pips.
const SPREAD_PIPS: f64 = 1.2;

struct SimBook {
    bid: f64,
    precision: u32,
}

struct SimState {
    rng: StdRng,
    books: HashMap<String, SimBook>,
}

/// Random-walk feed for running without a terminal.
pub struct SimulatedFeed {
    state: Mutex<SimState>,
    max_step_pips: f64,
}

impl SimulatedFeed {
    /// Create a feed quoting every instrument in `instruments`.
    ///
    /// With a `seed`, the sequence of prices is reproducible.
    pub fn new(instruments: &[InstrumentConfig], max_step_pips: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let books = instruments
            .iter()
            .map(|instrument| {
                let bid = round_to(opening_price(&instrument.symbol), instrument.precision);
                (
                    instrument.symbol.clone(),
                    SimBook {
                        bid,
                        precision: instrument.precision,
                    },
                )
            })
            .collect();

        info!(
            "Simulated feed started for {} instruments (max step {} pips)",
            instruments.len(),
            max_step_pips
        );

        Self {
            state: Mutex::new(SimState { rng, books }),
            max_step_pips: max_step_pips.max(0.0),
        }
    }

    /// Calculate the next bid from `current` using a step of at most `max_step_pips`.
    ///
    /// The result is rounded to `precision` digits and never drops below one point.
    pub fn next_price<R: Rng>(current: f64, precision: u32, max_step_pips: f64, rng: &mut R) -> f64 {
        let step_pips = if max_step_pips > 0.0 {
            rng.random_range(-max_step_pips..=max_step_pips)
        } else {
            0.0
        };
        let point = pip_size(precision) / 10.0;
        round_to(current + step_pips * pip_size(precision), precision).max(point)
    }
}

impl PriceFeed for SimulatedFeed {
    fn knows_symbol(&self, symbol: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.books.contains_key(symbol))
            .unwrap_or(false)
    }

    fn quote(&self, symbol: &str) -> Result<Tick> {
        let mut guard = self.state.lock()?;
        let SimState { rng, books } = &mut *guard;
        let book = books
            .get_mut(symbol)
            .ok_or_else(|| PipError::feed(symbol, "symbol not found"))?;

        book.bid = Self::next_price(book.bid, book.precision, self.max_step_pips, rng);
        let ask = round_to(book.bid + SPREAD_PIPS * pip_size(book.precision), book.precision);
        Ok(Tick::now(book.bid, ask))
    }
}

/// Plausible starting price for well-known pairs.
fn opening_price(symbol: &str) -> f64 {
    match symbol {
        "USDJPY" => 150.000,
        "EURJPY" => 162.500,
        "GBPJPY" => 190.000,
        "EURUSD" => 1.08500,
        "GBPUSD" => 1.27000,
        "AUDUSD" => 0.66000,
        "USDCHF" => 0.88000,
        _ => 100.0,
    }
}

fn round_to(price: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (price * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruments() -> Vec<InstrumentConfig> {
        vec![
            InstrumentConfig::new("USDJPY", 3),
            InstrumentConfig::new("EURUSD", 5),
        ]
    }

    #[test]
    fn seeded_feeds_repeat() {
        let a = SimulatedFeed::new(&instruments(), 3.0, Some(7));
        let b = SimulatedFeed::new(&instruments(), 3.0, Some(7));
        for _ in 0..20 {
            assert_eq!(a.quote("USDJPY").unwrap().bid, b.quote("USDJPY").unwrap().bid);
            assert_eq!(a.quote("EURUSD").unwrap().bid, b.quote("EURUSD").unwrap().bid);
        }
    }

    #[test]
    fn steps_are_bounded_and_quoted_at_precision() {
        let feed = SimulatedFeed::new(&instruments(), 2.0, Some(1));
        let mut last = 150.000;
        for _ in 0..200 {
            let tick = feed.quote("USDJPY").unwrap();
            assert!((tick.bid - last).abs() <= 0.02 + 1e-9);
            assert!(((tick.bid * 1000.0).round() - tick.bid * 1000.0).abs() < 1e-6);
            assert!(tick.ask > tick.bid);
            last = tick.bid;
        }
    }

    #[test]
    fn unknown_symbol_is_unavailable() {
        let feed = SimulatedFeed::new(&instruments(), 1.0, Some(1));
        assert!(!feed.knows_symbol("XAUUSD"));
        let err = feed.quote("XAUUSD").unwrap_err();
        assert!(matches!(err, PipError::FeedUnavailable { .. }));
    }

    #[test]
    fn verify_symbols_fails_fast() {
        let feed = SimulatedFeed::new(&instruments(), 1.0, Some(1));
        verify_symbols(&feed, &instruments()).unwrap();

        let mut wanted = instruments();
        wanted.push(InstrumentConfig::new("GBPUSD", 5));
        let err = verify_symbols(&feed, &wanted).unwrap_err();
        assert!(matches!(err, PipError::InvalidSymbolConfig(ref s) if s == "GBPUSD"));
    }

    #[test]
    fn zero_volatility_holds_price() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(SimulatedFeed::next_price(1.08500, 5, 0.0, &mut rng), 1.085);
    }
}
