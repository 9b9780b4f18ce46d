//!
//! Common types and utilities shared by the pip notifier and its client.
//!
//! This crate aggregates:
//! - `error`: unified error type `PipError` used across the workspace.
//! - `result`: handy `Result<T, PipError>` alias.
//! - `message`: speech and dashboard wire messages.
//! - `net`: networking defaults and request-path routing.
#![warn(missing_docs)]
pub mod error;
pub mod message;
pub mod net;
pub mod result;

pub use error::PipError;
pub use message::{DashboardMessage, Emotion, SpeechMessage};
pub use result::Result;
