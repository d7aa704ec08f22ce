//! Unified error types for netjitter

use thiserror::Error;

/// Main error type for jitter engine construction
///
/// Construction is the only fallible surface; steady-state operations handle
/// every condition in-band (silence fill, position drops) and return nothing.
#[derive(Error, Debug)]
pub enum JitterError {
    /// Ring capacity cannot hold the latency window plus one slot
    #[error("ring capacity {total_size} too small: need at least max_latency + slot_size = {required}")]
    RingTooSmall { total_size: usize, required: usize },

    /// Unknown correction strategy selector
    #[error("unknown correction strategy {0} (expected 0, 1 or 2)")]
    UnknownStrategy(u8),

    /// Sample width outside the supported set
    #[error("unsupported sample width of {0} bytes (expected 1 or 2)")]
    UnsupportedSampleWidth(usize),

    /// Tolerance preset ordering violated
    #[error("correction tolerance {corr_inc} must be greater than underrun tolerance {underrun_inc}")]
    ToleranceOrdering { corr_inc: f64, underrun_inc: f64 },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error reading a config file
    #[error("failed to read config file '{path}': {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a TOML config
    #[error("failed to parse engine config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type alias for netjitter operations
pub type Result<T> = std::result::Result<T, JitterError>;

impl JitterError {
    /// Create an invalid-configuration error with context
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
