//! Engine configuration with TOML file support

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{JitterError, Result};

/// Slot layout: interleaved PCM, little-endian for 16-bit samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFormat {
    pub channels: usize,
    /// Bytes per sample, 1 or 2
    pub bytes_per_sample: usize,
    /// Audio frames carried by one network slot
    pub frames_per_period: usize,
}

impl SlotFormat {
    /// One interleaved frame in bytes
    pub fn bytes_per_frame(&self) -> usize {
        self.channels * self.bytes_per_sample
    }

    /// One slot in bytes
    pub fn slot_bytes(&self) -> usize {
        self.bytes_per_frame() * self.frames_per_period
    }
}

impl std::fmt::Display for SlotFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}ch {}bit {} frames/period",
            self.channels,
            self.bytes_per_sample * 8,
            self.frames_per_period
        )
    }
}

/// Jitter engine configuration
///
/// All sizes are bytes. Validated once at engine construction; the slot size
/// is fixed for the lifetime of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Slot size in bytes (one audio period)
    pub slot_size: usize,

    /// Target maximum occupancy in bytes
    pub max_latency: usize,

    /// Ring capacity in bytes; at least max_latency + slot_size
    pub total_size: usize,

    /// Correction strategy selector (0, 1 or 2)
    pub strategy: u8,

    /// Monitor tap delay behind the primary read position, bytes
    pub monitor_latency: usize,

    /// Interleaved channel count
    pub channels: usize,

    /// Bytes per sample (1 or 2)
    pub bytes_per_sample: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        // 2ch 16-bit, 128-frame periods, four periods of latency
        Self {
            slot_size: 512,
            max_latency: 2048,
            total_size: 16384,
            strategy: 0,
            monitor_latency: 1024,
            channels: 2,
            bytes_per_sample: 2,
        }
    }
}

impl EngineConfig {
    /// Build a config from a slot format and latencies expressed in periods
    pub fn for_format(format: SlotFormat, latency_periods: usize, monitor_periods: usize) -> Self {
        let slot = format.slot_bytes();
        let max_latency = slot * latency_periods;
        Self {
            slot_size: slot,
            max_latency,
            total_size: max_latency + 8 * slot,
            strategy: 0,
            monitor_latency: slot * monitor_periods,
            channels: format.channels,
            bytes_per_sample: format.bytes_per_sample,
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| JitterError::ConfigIo {
            path: path.as_ref().to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Fail-fast validation; called by the engine constructor
    pub fn validate(&self) -> Result<()> {
        if self.slot_size == 0 {
            return Err(JitterError::invalid_config("slot_size must be non-zero"));
        }
        if self.channels == 0 {
            return Err(JitterError::invalid_config("channels must be non-zero"));
        }
        if !matches!(self.bytes_per_sample, 1 | 2) {
            return Err(JitterError::UnsupportedSampleWidth(self.bytes_per_sample));
        }
        if self.slot_size % (self.channels * self.bytes_per_sample) != 0 {
            return Err(JitterError::invalid_config(
                "slot_size must be a whole number of interleaved frames",
            ));
        }
        if self.strategy > 2 {
            return Err(JitterError::UnknownStrategy(self.strategy));
        }
        if self.total_size < self.max_latency + self.slot_size {
            return Err(JitterError::RingTooSmall {
                total_size: self.total_size,
                required: self.max_latency + self.slot_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_for_format_derives_sizes() {
        let format = SlotFormat {
            channels: 2,
            bytes_per_sample: 2,
            frames_per_period: 64,
        };
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.slot_bytes(), 256);

        let config = EngineConfig::for_format(format, 4, 2);
        assert_eq!(config.slot_size, 256);
        assert_eq!(config.max_latency, 1024);
        assert_eq!(config.monitor_latency, 512);
        assert!(config.validate().is_ok());

        assert_eq!(format.to_string(), "2ch 16bit 64 frames/period");
    }

    #[test]
    fn test_ring_too_small_rejected() {
        let config = EngineConfig {
            slot_size: 128,
            max_latency: 512,
            total_size: 512,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(crate::error::JitterError::RingTooSmall { required: 640, .. })
        ));
    }

    #[test]
    fn test_bad_strategy_and_width_rejected() {
        let config = EngineConfig {
            strategy: 7,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            bytes_per_sample: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(crate::error::JitterError::UnsupportedSampleWidth(3))
        ));
    }

    #[test]
    fn test_fractional_frame_slot_rejected() {
        let config = EngineConfig {
            slot_size: 130,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
            slot_size = 128
            max_latency = 512
            total_size = 4096
            strategy = 1
            monitor_latency = 256
            channels = 2
            bytes_per_sample = 2
        "#;
        let config = EngineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.slot_size, 128);
        assert_eq!(config.strategy, 1);
        assert!(config.validate().is_ok());

        // Partial files fall back to defaults
        let config = EngineConfig::from_toml_str("strategy = 2").unwrap();
        assert_eq!(config.strategy, 2);
        assert_eq!(config.slot_size, EngineConfig::default().slot_size);
    }
}
