//! Block-rate audio settings shared by the pool and every node.
//!
//! The sample rate and the active block length are fixed at startup and stamped
//! on every block the pool hands out.

use crate::constants::{DEFAULT_BLOCK_SAMPLES, DEFAULT_SAMPLE_RATE_HZ, MAX_BLOCK_SAMPLES};
use crate::error::ConfigError;

/// Sample rate and active block length used by a [`BlockPool`](crate::block::BlockPool).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AudioSettings {
    /// Sample rate in Hz.
    pub sample_rate_hz: f32,
    /// Active samples per block (`1..=MAX_BLOCK_SAMPLES`).
    pub block_samples: usize,
}

impl AudioSettings {
    /// Create settings without validating them. See [`validate`](Self::validate).
    pub const fn new(sample_rate_hz: f32, block_samples: usize) -> Self {
        AudioSettings {
            sample_rate_hz,
            block_samples,
        }
    }

    /// Check that the sample rate is positive and finite and that the block length
    /// fits in a pool block.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(ConfigError::SampleRate(self.sample_rate_hz));
        }
        if self.block_samples == 0 || self.block_samples > MAX_BLOCK_SAMPLES {
            return Err(ConfigError::BlockLength {
                requested: self.block_samples,
                max: MAX_BLOCK_SAMPLES,
            });
        }
        Ok(())
    }

    /// Duration of one block (one graph tick) in milliseconds.
    pub fn block_period_ms(&self) -> f32 {
        1000.0 * self.block_samples as f32 / self.sample_rate_hz
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings::new(DEFAULT_SAMPLE_RATE_HZ, DEFAULT_BLOCK_SAMPLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let s = AudioSettings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.block_samples, 128);
        assert_eq!(s.sample_rate_hz, 24_000.0);
    }

    #[test]
    fn rejects_bad_block_length() {
        assert_eq!(
            AudioSettings::new(24_000.0, 0).validate(),
            Err(ConfigError::BlockLength { requested: 0, max: MAX_BLOCK_SAMPLES })
        );
        assert!(AudioSettings::new(24_000.0, MAX_BLOCK_SAMPLES + 1).validate().is_err());
    }

    #[test]
    fn rejects_bad_sample_rate() {
        assert!(AudioSettings::new(0.0, 32).validate().is_err());
        assert!(AudioSettings::new(f32::NAN, 32).validate().is_err());
        assert!(AudioSettings::new(-16_000.0, 32).validate().is_err());
    }

    #[test]
    fn block_period() {
        let s = AudioSettings::new(24_000.0, 24);
        assert!((s.block_period_ms() - 1.0).abs() < 1e-6);
    }
}
