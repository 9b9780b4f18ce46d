//! Result type alias shared across the workspace.
//!
//! This module defines a convenient alias that defaults the error type to the
//! common `PipError`, so functions can simply return `Result<T>`.
use crate::error::PipError;

/// Workspace-wide `Result` alias with `PipError` as the default error.
pub type Result<T, E = PipError> = std::result::Result<T, E>;
