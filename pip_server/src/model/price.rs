//! Quote and sample types.
//!
//! A `Tick` is what the feed returns for one symbol: bid, ask and a millisecond UTC
//! timestamp. The sampling loop turns it into a `PriceSample` (bid only) after
//! checking that the bid is a usable price.

use chrono::Utc;
use pip_common::{PipError, Result};
use serde::{Deserialize, Serialize};

/// Current quote for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Best bid.
    pub bid: f64,
    /// Best ask.
    pub ask: f64,
    /// UTC timestamp in milliseconds since Unix epoch.
    pub timestamp: i64,
}

impl Tick {
    /// Build a tick stamped with the current time.
    pub fn now(bid: f64, ask: f64) -> Self {
        Self {
            bid,
            ask,
            timestamp: now_millis(),
        }
    }
}

/// Bid price observed for one symbol in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSample {
    /// Instrument symbol.
    pub symbol: String,
    /// Sampled bid.
    pub bid: f64,
    /// UTC timestamp in milliseconds since Unix epoch.
    pub timestamp: i64,
}

impl PriceSample {
    /// Create a sample directly.
    pub fn new(symbol: &str, bid: f64, timestamp: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            bid,
            timestamp,
        }
    }

    /// Take the bid of `tick`. A non-finite or non-positive bid is treated as the
    /// feed being unavailable for this symbol.
    pub fn from_tick(symbol: &str, tick: &Tick) -> Result<Self> {
        if !tick.bid.is_finite() || tick.bid <= 0.0 {
            return Err(PipError::feed(symbol, format!("unusable bid {}", tick.bid)));
        }
        Ok(Self::new(symbol, tick.bid, tick.timestamp))
    }
}

/// Current UTC time in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
