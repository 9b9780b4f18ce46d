//! Movement events.
//!
//! A `MovementEvent` is built by a tracker when a sample crosses a tier threshold.
//! It carries everything the broadcasters need: the speech text and emotion for
//! the avatar, and the prices for the dashboard.
use pip_common::message::{Emotion, SpeechMessage};
use serde::Serialize;

use crate::config::{InstrumentConfig, TierSettings};
use crate::model::tier::{Direction, Tier};

/// Detected movement of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementEvent {
    /// Instrument symbol.
    pub symbol: String,
    /// Baseline the sample was compared against.
    pub baseline: f64,
    /// Price that triggered the event (the new baseline).
    pub price: f64,
    /// Signed movement in pips.
    pub pips: f64,
    /// Up or down.
    pub direction: Direction,
    /// Severity.
    pub tier: Tier,
    /// Two-line notification text.
    pub text: String,
    /// Emotion tag of the tier.
    pub emotion: Emotion,
    /// Sample timestamp in milliseconds.
    pub timestamp: i64,
}

impl MovementEvent {
    /// Build the event for `instrument` moving from `baseline` to `price`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instrument: &InstrumentConfig,
        baseline: f64,
        price: f64,
        pips: f64,
        tier: Tier,
        settings: &TierSettings,
        timestamp: i64,
    ) -> Self {
        let direction = Direction::of(price - baseline);
        let text = format!(
            "{} が {:.1} pips {} しました\n{}",
            instrument.display_name(),
            pips.abs(),
            direction.label(),
            settings.message
        );

        Self {
            symbol: instrument.symbol.clone(),
            baseline,
            price,
            pips,
            direction,
            tier,
            text,
            emotion: settings.emotion,
            timestamp,
        }
    }

    /// Movement magnitude rounded to one decimal place.
    pub fn display_pips(&self) -> f64 {
        (self.pips.abs() * 10.0).round() / 10.0
    }

    /// Speech-channel message for this event.
    pub fn to_message(&self) -> SpeechMessage {
        SpeechMessage::assistant(self.text.clone(), self.emotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;

    #[test]
    fn text_has_two_lines() {
        let instrument = InstrumentConfig::new("USDJPY", 3);
        let thresholds = ThresholdConfig::default();
        let event = MovementEvent::new(
            &instrument,
            150.0,
            150.055,
            5.499999999999261,
            Tier::Small,
            &thresholds.small,
            1,
        );
        assert_eq!(
            event.text,
            "USDJPY が 5.5 pips 上昇 しました\n📊 すこしのうごきがありましたです"
        );
        assert_eq!(event.direction, Direction::Up);
        assert_eq!(event.display_pips(), 5.5);
        assert_eq!(event.emotion, Emotion::Happy);
    }

    #[test]
    fn reading_replaces_symbol_and_down_is_reported() {
        let instrument = InstrumentConfig {
            symbol: "GBPJPY".into(),
            precision: 3,
            reading: Some("ポンドえん".into()),
        };
        let thresholds = ThresholdConfig::default();
        let event = MovementEvent::new(
            &instrument,
            190.500,
            190.150,
            -35.0,
            Tier::Large,
            &thresholds.large,
            1,
        );
        assert!(event.text.starts_with("ポンドえん が 35.0 pips 下降 しました\n"));
        let message = event.to_message();
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["emotion"], "surprised");
        assert_eq!(value["type"], "message");
    }
}
