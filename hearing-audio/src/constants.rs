/// Maximum number of `f32` samples a block can hold (its `full_length`).
pub const MAX_BLOCK_SAMPLES: usize = 128;

/// Default active block length in samples.
pub const DEFAULT_BLOCK_SAMPLES: usize = 128;

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE_HZ: f32 = 24_000.0;

/// Upper bound on the number of blocks a single pool can manage (six 32-bit bitmap words).
pub const MAX_POOL_BLOCKS: usize = 192;

/// Number of bits tracked by one pool bitmap word.
pub const POOL_WORD_BITS: usize = 32;

/// Maximum adaptive filter length of the feedback canceller.
pub const MAX_AFC_FILTER_LEN: usize = 256;

/// Maximum number of second-order sections in a runtime band filter (order 8).
pub const MAX_BIQUAD_SECTIONS: usize = 4;

/// Maximum integer delay, in samples, a runtime band filter can apply.
pub const MAX_BAND_DELAY: usize = 512;

/// Highest Butterworth order the filterbank designer accepts.
pub const MAX_FILTER_ORDER: usize = 8;

/// Maximum number of filterbank channels.
pub const MAX_FILTERBANK_CHANNELS: usize = 16;
