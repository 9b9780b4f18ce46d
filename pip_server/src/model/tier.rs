//! Severity tiers and movement direction.
//!
//! `classify` maps an absolute pip magnitude to the highest tier whose threshold it
//! meets. Thresholds are inclusive lower bounds. Because prices arrive as binary
//! floats, a move of exactly 5 pips in decimal may come out as 4.9999999999; the
//! comparison therefore allows a tolerance far below one tenth of a pip.
use serde::Serialize;
use strum_macros::{Display, EnumString};

use crate::config::ThresholdConfig;

/// Slack applied to threshold comparisons, in pips.
const PIP_TOLERANCE: f64 = 1e-6;

/// Severity of a movement, ordered from quietest to loudest.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Tier {
    None,
    Small,
    Medium,
    Large,
}

/// Direction of a movement relative to the baseline.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Up if the price rose, down otherwise (including no change).
    pub fn of(delta: f64) -> Self {
        if delta > 0.0 { Direction::Up } else { Direction::Down }
    }

    /// Word used in notification text.
    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "上昇",
            Direction::Down => "下降",
        }
    }
}

/// Highest tier whose threshold `pips` meets or exceeds.
///
/// `pips` is expected to be an absolute magnitude; negative or NaN input yields
/// `Tier::None`.
pub fn classify(pips: f64, thresholds: &ThresholdConfig) -> Tier {
    let meets = |bound: f64| pips + PIP_TOLERANCE >= bound;

    if meets(thresholds.large.pips) {
        Tier::Large
    } else if meets(thresholds.medium.pips) {
        Tier::Medium
    } else if meets(thresholds.small.pips) {
        Tier::Small
    } else {
        Tier::None
    }
}
