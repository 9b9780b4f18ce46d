//! Error types shared between the notifier and the subscriber client.
//!
//! The `PipError` enum unifies I/O, serialization and WebSocket failures with the
//! domain conditions the notifier distinguishes: a price feed that cannot serve a
//! symbol, a configured symbol the feed does not know, a subscriber that could not
//! be reached, and a listener that could not bind.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by server and client.
#[derive(Error, Debug)]
pub enum PipError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// WebSocket protocol or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Settings are missing, malformed or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The price feed could not produce a quote for `symbol` in this cycle.
    #[error("Feed unavailable for {symbol}: {reason}")]
    FeedUnavailable {
        /// Instrument that was being sampled.
        symbol: String,
        /// Human-readable cause reported by the feed.
        reason: String,
    },

    /// A configured instrument is not recognised by the price feed.
    #[error("Symbol {0} is not provided by the price feed")]
    InvalidSymbolConfig(String),

    /// A send to one subscriber failed or timed out.
    #[error("Delivery to subscriber {peer} failed: {reason}")]
    SubscriberDelivery {
        /// Remote address (or label) of the subscriber.
        peer: String,
        /// What went wrong.
        reason: String,
    },

    /// The subscriber listening socket could not be bound.
    #[error("Failed to bind subscriber transport on {addr}: {source}")]
    TransportBind {
        /// Requested bind address.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The remote side closed the connection.
    #[error("Connection closed: {0}")]
    Disconnected(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for PipError {
    fn from(err: PoisonError<T>) -> Self {
        PipError::MutexLock(err.to_string())
    }
}

impl PipError {
    /// Build a `FeedUnavailable` error for `symbol`.
    pub fn feed(symbol: &str, reason: impl Into<String>) -> Self {
        PipError::FeedUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that only affect a single symbol or subscriber.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipError::FeedUnavailable { .. }
                | PipError::SubscriberDelivery { .. }
                | PipError::Disconnected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_error_mentions_symbol() {
        let err = PipError::feed("USDJPY", "terminal offline");
        assert_eq!(err.to_string(), "Feed unavailable for USDJPY: terminal offline");
        assert!(err.is_recoverable());
    }

    #[test]
    fn bind_failure_is_fatal() {
        let err = PipError::TransportBind {
            addr: "0.0.0.0:8000".into(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("0.0.0.0:8000"));
    }

    #[test]
    fn poisoned_lock_converts() {
        let lock = std::sync::Mutex::new(0);
        let _ = std::panic::catch_unwind(|| {
            let _guard = lock.lock().unwrap();
            panic!("poison");
        });
        let err: PipError = lock.lock().unwrap_err().into();
        assert!(matches!(err, PipError::MutexLock(_)));
    }
}
