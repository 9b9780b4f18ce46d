//! Per-instrument movement detection.
//!
//! A `SymbolTracker` holds the baseline of one instrument: the price at which the
//! last notification was sent, or the first price observed. Every sample is
//! compared against that baseline only. Samples below the smallest threshold leave
//! it untouched, so slow drift neither resets the reference point nor piles up
//! into a false large move. A notifying sample always becomes the new baseline.
//!
//! The tracker is not synchronized; the sampling loop owns all trackers and feeds
//! each one sequentially.
use crate::config::{InstrumentConfig, ThresholdConfig};
use crate::model::event::MovementEvent;
use crate::model::pip::to_pips;
use crate::model::price::PriceSample;
use crate::model::tier::classify;

/// Reference point of a tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Reference price.
    pub price: f64,
    /// When the reference was set, in milliseconds.
    pub timestamp: i64,
}

/// Outcome of feeding one sample to a tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// First sample: the baseline was set, nothing to compare against.
    Initialized(Baseline),
    /// Below the smallest threshold; baseline unchanged.
    Held {
        /// The standing baseline.
        baseline: Baseline,
        /// Signed movement against it, in pips.
        pips: f64,
    },
    /// A tier was reached; the sample became the new baseline.
    Moved(MovementEvent),
}

impl Observation {
    /// The event, if this observation produced one.
    pub fn event(&self) -> Option<&MovementEvent> {
        match self {
            Observation::Moved(event) => Some(event),
            _ => None,
        }
    }
}

/// Baseline state machine for one instrument.
#[derive(Debug, Clone)]
pub struct SymbolTracker {
    instrument: InstrumentConfig,
    baseline: Option<Baseline>,
}

impl SymbolTracker {
    /// Tracker waiting for its first sample.
    pub fn new(instrument: InstrumentConfig) -> Self {
        Self {
            instrument,
            baseline: None,
        }
    }

    /// Instrument this tracker follows.
    pub fn instrument(&self) -> &InstrumentConfig {
        &self.instrument
    }

    /// Current baseline, if the first sample has been seen.
    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    /// Compare `sample` against the baseline and advance the state.
    pub fn observe(&mut self, sample: &PriceSample, thresholds: &ThresholdConfig) -> Observation {
        let Some(baseline) = self.baseline else {
            let initial = Baseline {
                price: sample.bid,
                timestamp: sample.timestamp,
            };
            self.baseline = Some(initial);
            return Observation::Initialized(initial);
        };

        let delta = sample.bid - baseline.price;
        let pips = to_pips(delta, self.instrument.precision);
        let tier = classify(pips.abs(), thresholds);

        let Some(settings) = thresholds.settings(tier) else {
            return Observation::Held { baseline, pips };
        };

        let event = MovementEvent::new(
            &self.instrument,
            baseline.price,
            sample.bid,
            pips,
            tier,
            settings,
            sample.timestamp,
        );
        self.baseline = Some(Baseline {
            price: sample.bid,
            timestamp: sample.timestamp,
        });
        Observation::Moved(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tier::{Direction, Tier};

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig::default().with_pips(5.0, 16.0, 30.0)
    }

    fn tracker_at(instrument: InstrumentConfig, price: f64) -> SymbolTracker {
        SymbolTracker {
            instrument,
            baseline: Some(Baseline {
                price,
                timestamp: 0,
            }),
        }
    }

    fn usdjpy_at(price: f64) -> SymbolTracker {
        tracker_at(InstrumentConfig::new("USDJPY", 3), price)
    }

    #[test]
    fn first_sample_sets_baseline_without_event() {
        let mut tracker = SymbolTracker::new(InstrumentConfig::new("USDJPY", 3));
        let observation = tracker.observe(&PriceSample::new("USDJPY", 150.0, 7), &thresholds());
        assert_eq!(
            observation,
            Observation::Initialized(Baseline {
                price: 150.0,
                timestamp: 7
            })
        );
        assert!(observation.event().is_none());
        assert_eq!(tracker.baseline().unwrap().price, 150.0);
    }

    #[test]
    fn small_move_up_resets_baseline() {
        let mut tracker = usdjpy_at(150.000);
        let observation = tracker.observe(&PriceSample::new("USDJPY", 150.055, 10), &thresholds());
        let event = observation.event().expect("event");
        assert_eq!(event.tier, Tier::Small);
        assert_eq!(event.direction, Direction::Up);
        assert!((event.pips - 5.5).abs() < 1e-9);
        assert_eq!(event.display_pips(), 5.5);
        assert_eq!(
            tracker.baseline(),
            Some(Baseline {
                price: 150.055,
                timestamp: 10
            })
        );
    }

    #[test]
    fn sub_threshold_move_keeps_baseline() {
        let mut tracker = usdjpy_at(150.055);
        let observation = tracker.observe(&PriceSample::new("USDJPY", 150.040, 10), &thresholds());
        match observation {
            Observation::Held { baseline, pips } => {
                assert_eq!(baseline.price, 150.055);
                assert!((pips + 1.5).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(tracker.baseline().unwrap().price, 150.055);
    }

    #[test]
    fn five_digit_pair_below_small() {
        let mut tracker = tracker_at(InstrumentConfig::new("EURUSD", 5), 1.10000);
        let observation = tracker.observe(&PriceSample::new("EURUSD", 1.09970, 1), &thresholds());
        match observation {
            Observation::Held { pips, .. } => assert!((pips.abs() - 3.0).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(tracker.baseline().unwrap().price, 1.10000);
    }

    #[test]
    fn drift_never_accumulates() {
        let mut tracker = usdjpy_at(150.000);
        // Oscillates within +-4.9 pips for a long time.
        for i in 0..10_000 {
            let offset = ((i % 99) as f64 - 49.0) * 0.001;
            let observation = tracker.observe(
                &PriceSample::new("USDJPY", 150.000 + offset, i),
                &thresholds(),
            );
            assert!(observation.event().is_none(), "sample {} emitted", i);
        }
        assert_eq!(
            tracker.baseline(),
            Some(Baseline {
                price: 150.000,
                timestamp: 0
            })
        );
    }

    #[test]
    fn slow_walk_triggers_once_against_standing_baseline() {
        let mut tracker = usdjpy_at(150.000);
        let mut events = Vec::new();
        for step in 1..=6 {
            let price = 150.000 + step as f64 * 0.01;
            if let Observation::Moved(event) =
                tracker.observe(&PriceSample::new("USDJPY", price, step), &thresholds())
            {
                events.push(event);
            }
        }
        // 1..4 pips hold; 5 pips notifies; 6 is 1 pip above the new baseline.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tier, Tier::Small);
        assert!((tracker.baseline().unwrap().price - 150.05).abs() < 1e-12);
    }

    #[test]
    fn baseline_equals_triggering_price_for_every_tier() {
        let cases = [
            (150.100, Tier::Small),
            (149.900, Tier::Medium),
            (150.300, Tier::Large),
        ];
        let mut tracker = usdjpy_at(150.000);
        for (i, (price, tier)) in cases.into_iter().enumerate() {
            let observation =
                tracker.observe(&PriceSample::new("USDJPY", price, i as i64), &thresholds());
            let event = observation.event().expect("event");
            assert_eq!(event.tier, tier);
            assert_eq!(tracker.baseline().unwrap().price, price);
        }
    }

    #[test]
    fn large_drop_reports_down() {
        let mut tracker = usdjpy_at(150.000);
        let observation = tracker.observe(&PriceSample::new("USDJPY", 149.650, 1), &thresholds());
        let event = observation.event().unwrap();
        assert_eq!(event.tier, Tier::Large);
        assert_eq!(event.direction, Direction::Down);
        assert!(event.pips < 0.0);
        assert!(event.text.contains("35.0 pips 下降"));
    }
}
