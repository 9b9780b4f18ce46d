//! Domain models of the notifier.
//!
//! - `pip`: price difference to pip conversion.
//! - `tier`: severity tiers, direction and the classifier.
//! - `price`: feed ticks and sampled prices.
//! - `event`: movement events and their speech text.
//! - `tracker`: per-instrument baseline state machine.

pub mod event;
pub mod pip;
pub mod price;
pub mod tier;
pub mod tracker;
