//! Configuration-time errors.
//!
//! Nothing on the tick path returns these: exhaustion there is an empty `Option`
//! and invalid numeric input is recovered locally.

use thiserror::Error;

/// Errors raised while building pools, settings, or runtime filter configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Requested pool capacity is zero or above the supported maximum.
    #[error("pool capacity {requested} is outside 1..={max}")]
    PoolCapacity { requested: usize, max: usize },

    /// Active block length is zero or larger than a pool block.
    #[error("block length {requested} is outside 1..={max}")]
    BlockLength { requested: usize, max: usize },

    /// Sample rate is not a positive finite number.
    #[error("sample rate {0} Hz is not a positive finite number")]
    SampleRate(f32),

    /// Memory for a fixed-size structure could not be reserved.
    #[error("could not reserve memory for {0}")]
    OutOfMemory(&'static str),

    /// Filter coefficient set is empty, too long, or has a zero leading denominator term.
    #[error("invalid filter coefficients: {0}")]
    FilterCoefficients(&'static str),

    /// Requested sample delay exceeds the delay line.
    #[error("delay of {requested} samples exceeds the maximum of {max}")]
    Delay { requested: usize, max: usize },
}
