//! Cascaded second-order sections and an integer delay line.
//!
//! Runtime counterpart of the offline filterbank designer: each band filter is
//! a cascade of up to [`MAX_BIQUAD_SECTIONS`] biquads in transposed direct
//! form II followed by a peak-alignment delay.

use crate::constants::{MAX_BAND_DELAY, MAX_BIQUAD_SECTIONS};
use crate::error::ConfigError;

/// One second-order section, normalized so `a0 == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Pass-through section.
    pub const IDENTITY: BiquadCoefficients = BiquadCoefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Build from an SOS row `[b0, b1, b2, a0, a1, a2]`, dividing through by `a0`.
    pub fn from_sos_row(row: &[f64; 6]) -> Result<Self, ConfigError> {
        let a0 = row[3];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(ConfigError::FilterCoefficients("leading denominator term is zero"));
        }
        if row.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::FilterCoefficients("non-finite coefficient"));
        }
        Ok(BiquadCoefficients {
            b0: (row[0] / a0) as f32,
            b1: (row[1] / a0) as f32,
            b2: (row[2] / a0) as f32,
            a1: (row[4] / a0) as f32,
            a2: (row[5] / a0) as f32,
        })
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SectionState {
    z1: f32,
    z2: f32,
}

/// Cascade of up to [`MAX_BIQUAD_SECTIONS`] biquads.
#[derive(Debug, Clone)]
pub struct BiquadCascade {
    sections: [BiquadCoefficients; MAX_BIQUAD_SECTIONS],
    state: [SectionState; MAX_BIQUAD_SECTIONS],
    count: usize,
}

impl BiquadCascade {
    /// An empty cascade passes audio through unchanged.
    pub const fn new() -> Self {
        BiquadCascade {
            sections: [BiquadCoefficients::IDENTITY; MAX_BIQUAD_SECTIONS],
            state: [SectionState { z1: 0.0, z2: 0.0 }; MAX_BIQUAD_SECTIONS],
            count: 0,
        }
    }

    /// Replace the sections and clear the filter state.
    pub fn set_sections(&mut self, sections: &[BiquadCoefficients]) -> Result<(), ConfigError> {
        if sections.len() > MAX_BIQUAD_SECTIONS {
            return Err(ConfigError::FilterCoefficients("too many second-order sections"));
        }
        self.sections = [BiquadCoefficients::IDENTITY; MAX_BIQUAD_SECTIONS];
        self.sections[..sections.len()].copy_from_slice(sections);
        self.count = sections.len();
        self.reset();
        Ok(())
    }

    pub fn sections(&self) -> &[BiquadCoefficients] {
        &self.sections[..self.count]
    }

    pub fn reset(&mut self) {
        self.state = [SectionState::default(); MAX_BIQUAD_SECTIONS];
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut x = input;
        for (c, s) in self.sections[..self.count]
            .iter()
            .zip(self.state.iter_mut())
        {
            let y = c.b0 * x + s.z1;
            s.z1 = c.b1 * x - c.a1 * y + s.z2;
            s.z2 = c.b2 * x - c.a2 * y;
            x = y;
        }
        x
    }

    pub fn process_in_place(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

impl Default for BiquadCascade {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-capacity integer sample delay (`0..=MAX_BAND_DELAY`).
#[derive(Clone)]
pub struct DelayLine {
    buf: [f32; MAX_BAND_DELAY],
    delay: usize,
    pos: usize,
}

impl DelayLine {
    pub const fn new() -> Self {
        DelayLine {
            buf: [0.0; MAX_BAND_DELAY],
            delay: 0,
            pos: 0,
        }
    }

    /// Set the delay in samples and clear the line.
    pub fn set_delay(&mut self, delay: usize) -> Result<(), ConfigError> {
        if delay > MAX_BAND_DELAY {
            return Err(ConfigError::Delay {
                requested: delay,
                max: MAX_BAND_DELAY,
            });
        }
        self.delay = delay;
        self.reset();
        Ok(())
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn reset(&mut self) {
        self.buf = [0.0; MAX_BAND_DELAY];
        self.pos = 0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.delay == 0 {
            return input;
        }
        let out = self.buf[self.pos];
        self.buf[self.pos] = input;
        self.pos += 1;
        if self.pos >= self.delay {
            self.pos = 0;
        }
        out
    }

    pub fn process_in_place(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for DelayLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DelayLine")
            .field("delay", &self.delay)
            .field("pos", &self.pos)
            .finish()
    }
}
