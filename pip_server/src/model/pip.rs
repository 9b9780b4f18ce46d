//! Pip conversion.
//!
//! One pip is one unit at the second-to-last quoted decimal place: `0.01` for a
//! 3-digit pair such as USDJPY, `0.0001` for a 5-digit pair such as EURUSD.

/// Size of one pip for an instrument quoted with `precision` fractional digits.
pub fn pip_size(precision: u32) -> f64 {
    10f64.powi(1 - precision as i32)
}

/// Express a price difference in pips. Sign follows `delta`.
pub fn to_pips(delta: f64, precision: u32) -> f64 {
    delta / pip_size(precision)
}
