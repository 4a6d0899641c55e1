//! Band filter node: biquad cascade followed by an integer delay.
//!
//! Typically loaded from one band of a designed filterbank so that the bands'
//! impulse-response peaks line up when the outputs are mixed.

use crate::dsp::biquad::{BiquadCascade, BiquadCoefficients, DelayLine};
use crate::error::ConfigError;
use crate::node::{AudioNode, NodeContext};

#[cfg(feature = "design")]
use crate::constants::MAX_BIQUAD_SECTIONS;
#[cfg(feature = "design")]
use crate::design::BandFilter;

/// Cascaded-biquad filter with output delay. One input, one output.
#[derive(Default)]
pub struct AudioFilterBiquad {
    cascade: BiquadCascade,
    delay: DelayLine,
}

impl AudioFilterBiquad {
    /// Pass-through filter with no delay.
    pub const fn new() -> Self {
        AudioFilterBiquad {
            cascade: BiquadCascade::new(),
            delay: DelayLine::new(),
        }
    }

    /// Load coefficients and delay. On error the node is left unchanged.
    pub fn set_sections(
        &mut self,
        sections: &[BiquadCoefficients],
        delay: usize,
    ) -> Result<(), ConfigError> {
        let mut cascade = BiquadCascade::new();
        cascade.set_sections(sections)?;
        let mut line = DelayLine::new();
        line.set_delay(delay)?;
        self.cascade = cascade;
        self.delay = line;
        Ok(())
    }

    /// Load one designed filterbank band (its SOS rows and alignment delay).
    #[cfg(feature = "design")]
    pub fn from_band(band: &BandFilter) -> Result<Self, ConfigError> {
        let rows = band.sos();
        if rows.len() > MAX_BIQUAD_SECTIONS {
            return Err(ConfigError::FilterCoefficients("too many second-order sections"));
        }
        let mut sections = [BiquadCoefficients::IDENTITY; MAX_BIQUAD_SECTIONS];
        for (dst, row) in sections.iter_mut().zip(rows) {
            *dst = BiquadCoefficients::from_sos_row(row)?;
        }
        let mut node = AudioFilterBiquad::new();
        node.set_sections(&sections[..rows.len()], band.delay())?;
        Ok(node)
    }

    pub fn sections(&self) -> &[BiquadCoefficients] {
        self.cascade.sections()
    }

    pub fn delay(&self) -> usize {
        self.delay.delay()
    }

    /// Clear filter and delay state.
    pub fn reset(&mut self) {
        self.cascade.reset();
        self.delay.reset();
    }
}

impl AudioNode for AudioFilterBiquad {
    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let Some(mut block) = ctx.receive_writable(0) else {
            return;
        };
        self.cascade.process_in_place(&mut block);
        self.delay.process_in_place(&mut block);
        ctx.transmit(&block.into_shared(), 0);
    }
}
