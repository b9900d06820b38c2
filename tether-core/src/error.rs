//! Error types for the reactive engine.
//!
//! Most engine conditions are silent no-ops (tracking outside an effect,
//! triggering an untracked container, stopping a stopped effect), so the
//! error surface is small: container writes that cannot be applied and
//! configuration that cannot be loaded.

use thiserror::Error;

/// Errors surfaced by observed containers and runtime configuration.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A positional write addressed an index past the end of a list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration parsed but holds an unusable value.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
