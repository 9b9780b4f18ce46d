//! Runtime settings.
//!
//! `Settings` is assembled once at startup (defaults → optional JSON file → CLI
//! overrides), validated, and then only ever read. Instruments are a typed map from
//! symbol to a small fixed record; thresholds carry their message and emotion so the
//! classifier itself holds no text.
//!
//! Example file:
//!
//! ```json
//! {
//!   "poll_interval_secs": 1.0,
//!   "instruments": { "USDJPY": { "precision": 3, "reading": "どるえん" } },
//!   "thresholds": {
//!     "small":  { "pips": 5.0,  "message": "📊 すこしのうごきがありましたです", "emotion": "happy" },
//!     "medium": { "pips": 16.0, "message": "⚠️ ちゅうくらいのうごきがありましたです", "emotion": "surprised" },
//!     "large":  { "pips": 30.0, "message": "🚨 えええっ～びっくりです。大変です。", "emotion": "surprised" }
//!   },
//!   "transport": { "host": "0.0.0.0", "port": 8000 }
//! }
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use pip_common::message::Emotion;
use pip_common::net::{DEFAULT_HOST, DEFAULT_PORT};
use pip_common::{PipError, Result};
use serde::{Deserialize, Serialize};

use crate::args::Args;
use crate::model::tier::Tier;

/// Largest precision accepted for an instrument.
const MAX_PRECISION: u32 = 10;

/// Longest accepted poll interval, in seconds (one day).
const MAX_POLL_INTERVAL_SECS: f64 = 86_400.0;

/// Complete, immutable settings of the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Monitored instruments keyed by symbol.
    pub instruments: BTreeMap<String, InstrumentSpec>,
    /// Seconds between two sampling cycles.
    pub poll_interval_secs: f64,
    /// Tier thresholds with their messages.
    pub thresholds: ThresholdConfig,
    /// Subscriber transport.
    pub transport: TransportConfig,
}

/// Per-instrument record in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Number of quoted fractional digits.
    #[serde(alias = "digits")]
    pub precision: u32,
    /// Spoken reading used in notifications instead of the symbol.
    #[serde(default, alias = "jp_name", skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
}

/// Instrument as handed to a tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    /// Feed symbol.
    pub symbol: String,
    /// Number of quoted fractional digits.
    pub precision: u32,
    /// Spoken reading, if any.
    pub reading: Option<String>,
}

impl InstrumentConfig {
    /// Create an instrument without a reading.
    #[cfg(test)]
    pub fn new(symbol: &str, precision: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            precision,
            reading: None,
        }
    }

    /// Name used in notification text.
    pub fn display_name(&self) -> &str {
        self.reading.as_deref().unwrap_or(&self.symbol)
    }
}

/// Message and emotion attached to one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSettings {
    /// Inclusive lower bound of the tier, in pips.
    pub pips: f64,
    /// Second line of the notification text.
    pub message: String,
    /// Emotion tag sent with the notification.
    pub emotion: Emotion,
}

/// Three ascending tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    #[allow(missing_docs)]
    pub small: TierSettings,
    #[allow(missing_docs)]
    pub medium: TierSettings,
    #[allow(missing_docs)]
    pub large: TierSettings,
}

impl ThresholdConfig {
    /// Settings of a notifying tier; `None` for `Tier::None`.
    pub fn settings(&self, tier: Tier) -> Option<&TierSettings> {
        match tier {
            Tier::None => None,
            Tier::Small => Some(&self.small),
            Tier::Medium => Some(&self.medium),
            Tier::Large => Some(&self.large),
        }
    }

    /// Same thresholds with different pip bounds; messages are kept.
    #[cfg(test)]
    pub fn with_pips(mut self, small: f64, medium: f64, large: f64) -> Self {
        self.small.pips = small;
        self.medium.pips = medium;
        self.large.pips = large;
        self
    }

    fn validate(&self) -> Result<()> {
        let bounds = [self.small.pips, self.medium.pips, self.large.pips];
        if bounds.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(PipError::Config(format!(
                "thresholds must be positive numbers, got {:?}",
                bounds
            )));
        }
        if !(bounds[0] < bounds[1] && bounds[1] < bounds[2]) {
            return Err(PipError::Config(format!(
                "thresholds must be strictly ascending (small < medium < large), got {:?}",
                bounds
            )));
        }
        Ok(())
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            small: TierSettings {
                pips: 5.0,
                message: "📊 すこしのうごきがありましたです".to_string(),
                emotion: Emotion::Happy,
            },
            medium: TierSettings {
                pips: 16.0,
                message: "⚠️ ちゅうくらいのうごきがありましたです".to_string(),
                emotion: Emotion::Surprised,
            },
            large: TierSettings {
                pips: 30.0,
                message: "🚨 えええっ～びっくりです。大変です。".to_string(),
                emotion: Emotion::Surprised,
            },
        }
    }
}

/// WebSocket listener and delivery limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Budget for delivering one broadcast to all subscribers, in milliseconds.
    pub send_timeout_ms: u64,
    /// Messages that may wait in a subscriber's queue before it counts as stalled.
    pub queue_capacity: usize,
    /// Time given to subscribers to receive the close frame on shutdown.
    pub shutdown_grace_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            send_timeout_ms: 250,
            queue_capacity: 32,
            shutdown_grace_ms: 1000,
        }
    }
}

impl TransportConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        pip_common::net::addr(&self.host, self.port)
    }

    /// Per-broadcast delivery budget.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Grace period for closing subscribers.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        let instruments = [
            ("USDJPY", 3),
            ("EURUSD", 5),
            ("GBPUSD", 5),
            ("EURJPY", 3),
            ("GBPJPY", 3),
        ]
        .into_iter()
        .map(|(symbol, precision)| {
            (
                symbol.to_string(),
                InstrumentSpec {
                    precision,
                    reading: None,
                },
            )
        })
        .collect();

        Self {
            instruments,
            poll_interval_secs: 1.0,
            thresholds: ThresholdConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| PipError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
            .map_err(|e| PipError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse settings from JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build the final settings from CLI arguments and validate them.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut settings = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(args);
        settings.validate()?;
        Ok(settings)
    }

    /// Apply CLI overrides on top of the loaded values.
    pub fn apply_overrides(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.transport.host = host.clone();
        }
        if let Some(port) = args.port {
            self.transport.port = port;
        }
        if let Some(interval) = args.interval {
            self.poll_interval_secs = interval;
        }
    }

    /// Check every field; the first problem found is reported.
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            return Err(PipError::Config("no instruments configured".into()));
        }
        for (symbol, spec) in &self.instruments {
            if symbol.trim().is_empty() {
                return Err(PipError::Config("empty instrument symbol".into()));
            }
            if spec.precision == 0 || spec.precision > MAX_PRECISION {
                return Err(PipError::Config(format!(
                    "{}: precision must be between 1 and {}, got {}",
                    symbol, MAX_PRECISION, spec.precision
                )));
            }
        }
        if !self.poll_interval_secs.is_finite()
            || self.poll_interval_secs <= 0.0
            || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS
        {
            return Err(PipError::Config(format!(
                "poll interval must be in (0, {}] seconds, got {}",
                MAX_POLL_INTERVAL_SECS, self.poll_interval_secs
            )));
        }
        self.thresholds.validate()?;
        if self.transport.send_timeout_ms == 0 {
            return Err(PipError::Config("send timeout must be positive".into()));
        }
        if self.transport.queue_capacity == 0 {
            return Err(PipError::Config("queue capacity must be positive".into()));
        }
        Ok(())
    }

    /// Interval between sampling cycles.
    ///
    /// Falls back to one second if the value does not fit a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs).unwrap_or(Duration::from_secs(1))
    }

    /// Instruments in symbol order.
    pub fn instrument_configs(&self) -> Vec<InstrumentConfig> {
        self.instruments
            .iter()
            .map(|(symbol, spec)| InstrumentConfig {
                symbol: symbol.clone(),
                precision: spec.precision,
                reading: spec.reading.clone(),
            })
            .collect()
    }

    /// Settings as a JSON value (for the dashboard `init` message).
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
