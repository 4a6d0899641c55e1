//! Sine wave oscillator with a 32-bit phase accumulator.

use core::f32::consts::TAU;

use libm::{fmodf, sinf};

use crate::node::{AudioNode, NodeContext};

/// 2^32 as `f32`: one full accumulator turn.
const PHASE_TURN: f32 = 4_294_967_296.0;

/// Sine wave oscillator. Source node: 0 inputs, 1 output.
///
/// The phase increment is derived from the pool's sample rate each tick, so the
/// same oscillator works at any configured rate.
///
/// # Example
/// ```ignore
/// let mut sine = AudioSynthSine::new();
/// sine.frequency(1_000.0);
/// sine.amplitude(0.1);
/// ```
pub struct AudioSynthSine {
    /// Phase accumulator (wraps naturally at 32 bits = 360°).
    phase_accumulator: u32,
    frequency_hz: f32,
    magnitude: f32,
}

impl AudioSynthSine {
    /// Create a new sine oscillator, initially silent (magnitude = 0).
    pub const fn new() -> Self {
        AudioSynthSine {
            phase_accumulator: 0,
            frequency_hz: 0.0,
            magnitude: 0.0,
        }
    }

    /// Set the oscillator frequency in Hz.
    pub fn frequency(&mut self, hz: f32) {
        self.frequency_hz = hz.max(0.0);
    }

    /// Set the output amplitude (0.0 = silent, 1.0 = full scale).
    pub fn amplitude(&mut self, level: f32) {
        self.magnitude = level.clamp(0.0, 1.0);
    }

    /// Set the phase offset in degrees (0–360).
    pub fn phase(&mut self, angle: f32) {
        let mut angle = fmodf(angle, 360.0);
        if angle < 0.0 {
            angle += 360.0;
        }
        self.phase_accumulator = (angle / 360.0 * PHASE_TURN) as u32;
    }

    fn increment(&self, sample_rate_hz: f32) -> u32 {
        (self.frequency_hz / sample_rate_hz * PHASE_TURN) as u32
    }
}

impl Default for AudioSynthSine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for AudioSynthSine {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let settings = ctx.pool().settings();
        let inc = self.increment(settings.sample_rate_hz);
        let advance = inc.wrapping_mul(settings.block_samples as u32);

        if self.magnitude == 0.0 {
            // Silent: advance phase but produce no output
            self.phase_accumulator = self.phase_accumulator.wrapping_add(advance);
            return;
        }
        let Some(mut out) = ctx.allocate() else {
            self.phase_accumulator = self.phase_accumulator.wrapping_add(advance);
            return;
        };

        let mut ph = self.phase_accumulator;
        for sample in out.iter_mut() {
            *sample = self.magnitude * sinf(ph as f32 / PHASE_TURN * TAU);
            ph = ph.wrapping_add(inc);
        }
        self.phase_accumulator = ph;
        ctx.transmit(&out.into_shared(), 0);
    }
}
