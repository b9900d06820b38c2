//! Runtime Configuration
//!
//! A runtime is configured once at construction. The only tunable is the
//! number of nesting levels handled by the depth-bit fast path; deeper runs
//! fall back to rebuilding an effect's subscriptions from scratch.

use serde::Deserialize;

use crate::error::{ReactiveError, Result};

/// Largest nesting depth the depth-bit markers can represent.
pub const MAX_MARKER_BITS: u32 = 30;

/// Settings for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Effect nesting depth up to which the depth-bit markers are used.
    pub max_marker_bits: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_marker_bits: MAX_MARKER_BITS,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a configuration from JSON.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every field is within range.
    pub fn validate(&self) -> Result<()> {
        if self.max_marker_bits > MAX_MARKER_BITS {
            return Err(ReactiveError::InvalidConfig(format!(
                "max_marker_bits must be at most {MAX_MARKER_BITS}, got {}",
                self.max_marker_bits
            )));
        }
        Ok(())
    }
}
