//! Envelope follower for the compressor's level detector.
//!
//! Attack and release times are given the ANSI S3.22 way: the time constants
//! are scaled (`/2.425` for attack, `/1.782` for release) so the nominal times
//! match the hearing-aid test-standard definitions. Each sample updates
//!
//! ```text
//! state = state * coef + |x| * (1 - coef)
//! ```
//!
//! with `coef = alpha` while the rectified input is at or above the state
//! (rising) and `coef = beta` otherwise (falling).

use libm::fabsf;

/// Attack/release envelope follower over the rectified signal.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    /// Current envelope level (linear)
    state: f32,
    alpha: f32,
    beta: f32,
    sample_rate: f32,
    attack_ms: f32,
    release_ms: f32,
}

impl EnvelopeFollower {
    /// Create a follower with 1 ms attack and 50 ms release.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_times(sample_rate, 1.0, 50.0)
    }

    /// Create with specified attack and release times.
    pub fn with_times(sample_rate: f32, attack_ms: f32, release_ms: f32) -> Self {
        let mut follower = EnvelopeFollower {
            state: 0.0,
            alpha: 0.0,
            beta: 0.0,
            sample_rate,
            attack_ms: attack_ms.max(0.0),
            release_ms: release_ms.max(0.0),
        };
        follower.recalculate_coefficients();
        follower
    }

    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms.max(0.0);
        self.recalculate_coefficients();
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.release_ms = release_ms.max(0.0);
        self.recalculate_coefficients();
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Update sample rate and recalculate coefficients.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coefficients();
    }

    /// Smoothing coefficient used while the signal rises.
    pub fn attack_coefficient(&self) -> f32 {
        self.alpha
    }

    /// Smoothing coefficient used while the signal falls.
    pub fn release_coefficient(&self) -> f32 {
        self.beta
    }

    /// Process one sample and return the updated envelope.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let rectified = fabsf(input);
        let coef = if rectified >= self.state {
            self.alpha
        } else {
            self.beta
        };
        self.state = self.state * coef + rectified * (1.0 - coef);
        self.state
    }

    /// Process a block: `output[i]` receives the envelope after `input[i]`.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (x, env) in input.iter().zip(output.iter_mut()) {
            *env = self.process(*x);
        }
    }

    /// Current envelope level (linear).
    pub fn level(&self) -> f32 {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    fn recalculate_coefficients(&mut self) {
        let ansi_atk = 0.001 * self.attack_ms * self.sample_rate / 2.425;
        let ansi_rel = 0.001 * self.release_ms * self.sample_rate / 1.782;
        self.alpha = ansi_atk / (1.0 + ansi_atk);
        self.beta = ansi_rel / (10.0 + ansi_rel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficients_follow_ansi_scaling() {
        let env = EnvelopeFollower::with_times(24_000.0, 1.0, 50.0);
        let atk = 0.001 * 1.0 * 24_000.0 / 2.425;
        let rel = 0.001 * 50.0 * 24_000.0 / 1.782;
        assert!((env.attack_coefficient() - atk / (1.0 + atk)).abs() < 1e-6);
        assert!((env.release_coefficient() - rel / (10.0 + rel)).abs() < 1e-6);
        assert!(env.release_coefficient() > env.attack_coefficient());
    }

    #[test]
    fn zero_times_track_instantly() {
        let mut env = EnvelopeFollower::with_times(24_000.0, 0.0, 0.0);
        assert_eq!(env.process(0.5), 0.5);
        assert_eq!(env.process(-0.25), 0.25);
    }

    #[test]
    fn rises_to_steady_input() {
        let mut env = EnvelopeFollower::new(24_000.0);
        let mut level = 0.0;
        for _ in 0..2400 {
            level = env.process(0.5);
        }
        assert!((level - 0.5).abs() < 1e-3, "envelope settled at {}", level);
    }

    #[test]
    fn release_is_slower_than_attack() {
        let mut env = EnvelopeFollower::new(24_000.0);
        let mut rise = 0;
        while env.process(1.0) < 0.9 {
            rise += 1;
        }
        let mut fall = 0;
        while env.process(0.0) > 0.1 {
            fall += 1;
        }
        assert!(fall > rise, "fall {} samples, rise {} samples", fall, rise);
    }

    #[test]
    fn process_block_matches_per_sample() {
        let input = [0.1f32, -0.4, 0.3, 0.0, -0.9];
        let mut a = EnvelopeFollower::new(16_000.0);
        let mut b = a.clone();
        let mut out = [0.0f32; 5];
        a.process_block(&input, &mut out);
        for (i, &x) in input.iter().enumerate() {
            assert_eq!(out[i], b.process(x));
        }
        a.reset();
        assert_eq!(a.level(), 0.0);
    }
}
