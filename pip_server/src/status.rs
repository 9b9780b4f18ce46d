//! Published per-instrument view for the dashboard.
//!
//! Trackers own their baselines; the sampling loop copies the latest price and
//! baseline into this board after every sample so that connection handlers can
//! build a dashboard `init` message without touching tracker state.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use pip_common::message::SymbolStatus;

use crate::config::InstrumentConfig;

/// Shared, read-mostly map of symbol → status.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<BTreeMap<String, SymbolStatus>>>,
}

impl StatusBoard {
    /// Board listing every instrument with no prices yet.
    pub fn new(instruments: &[InstrumentConfig]) -> Self {
        let map = instruments
            .iter()
            .map(|instrument| {
                (
                    instrument.symbol.clone(),
                    SymbolStatus {
                        symbol: instrument.symbol.clone(),
                        reading: instrument.reading.clone(),
                        price: None,
                        base_price: None,
                    },
                )
            })
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Record the latest sample and the baseline now in force.
    pub fn record(&self, symbol: &str, price: f64, base_price: f64) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = map.get_mut(symbol) {
            status.price = Some(price);
            status.base_price = Some(base_price);
        }
    }

    /// Copy of all statuses in symbol order.
    pub fn snapshot(&self) -> Vec<SymbolStatus> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_known_symbols_only() {
        let board = StatusBoard::new(&[
            InstrumentConfig::new("USDJPY", 3),
            InstrumentConfig::new("EURUSD", 5),
        ]);
        board.record("USDJPY", 150.01, 150.0);
        board.record("XAUUSD", 2000.0, 2000.0);

        let snapshot = board.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].symbol, "EURUSD");
        assert_eq!(snapshot[0].price, None);
        assert_eq!(snapshot[1].price, Some(150.01));
        assert_eq!(snapshot[1].base_price, Some(150.0));
    }
}
