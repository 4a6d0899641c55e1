//! Wide-dynamic-range compressor node.
//!
//! Per sample: envelope follower, then the WDRC gain law, then the gain is
//! applied in place. The block keeps its id and length.

use crate::constants::MAX_BLOCK_SAMPLES;
use crate::dsp::envelope::EnvelopeFollower;
use crate::dsp::helpers::{block_multiply, db2};
use crate::dsp::wdrc::{WdrcGain, WdrcParams};
use crate::node::{AudioNode, NodeContext};

/// Single-band WDRC compressor. One input, one output.
///
/// # Example
/// ```ignore
/// let mut comp = AudioEffectCompWdrc::new(WdrcParams::default());
/// comp.set_compression_ratio(3.0);
/// comp.set_compression_knee_db(55.0);
/// ```
pub struct AudioEffectCompWdrc {
    envelope: EnvelopeFollower,
    gain: WdrcGain,
    env_buf: [f32; MAX_BLOCK_SAMPLES],
    gain_buf: [f32; MAX_BLOCK_SAMPLES],
}

impl AudioEffectCompWdrc {
    pub fn new(params: WdrcParams) -> Self {
        AudioEffectCompWdrc {
            envelope: EnvelopeFollower::with_times(
                params.sample_rate_hz,
                params.attack_ms,
                params.release_ms,
            ),
            gain: WdrcGain::new(params),
            env_buf: [0.0; MAX_BLOCK_SAMPLES],
            gain_buf: [1.0; MAX_BLOCK_SAMPLES],
        }
    }

    /// Replace every parameter, including the envelope times and sample rate.
    pub fn set_params(&mut self, params: WdrcParams) {
        self.envelope.set_sample_rate(params.sample_rate_hz);
        self.envelope.set_attack_ms(params.attack_ms);
        self.envelope.set_release_ms(params.release_ms);
        self.gain.set_params(params);
    }

    /// Replace every parameter with expansion switched off.
    pub fn set_params_without_expansion(&mut self, params: WdrcParams) {
        self.set_params(params);
        self.gain.set_params_without_expansion(params);
    }

    pub fn params(&self) -> &WdrcParams {
        self.gain.params()
    }

    pub fn set_attack_release_ms(&mut self, attack_ms: f32, release_ms: f32) {
        self.envelope.set_attack_ms(attack_ms);
        self.envelope.set_release_ms(release_ms);
        let params = WdrcParams {
            attack_ms: self.envelope.attack_ms(),
            release_ms: self.envelope.release_ms(),
            ..*self.gain.params()
        };
        self.gain.set_params(params);
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain.set_gain_db(gain_db);
    }

    pub fn increment_gain_db(&mut self, delta_db: f32) -> f32 {
        self.gain.increment_gain_db(delta_db)
    }

    pub fn set_max_db(&mut self, max_db: f32) {
        self.gain.set_max_db(max_db);
    }

    pub fn set_expansion_knee_db(&mut self, knee_db: f32) {
        self.gain.set_expansion_knee_db(knee_db);
    }

    pub fn set_expansion_ratio(&mut self, ratio: f32) {
        self.gain.set_expansion_ratio(ratio);
    }

    pub fn set_compression_knee_db(&mut self, knee_db: f32) {
        self.gain.set_compression_knee_db(knee_db);
    }

    pub fn set_compression_ratio(&mut self, ratio: f32) {
        self.gain.set_compression_ratio(ratio);
    }

    pub fn set_limiter_knee_db(&mut self, bolt_db: f32) {
        self.gain.set_limiter_knee_db(bolt_db);
    }

    pub fn set_decimation(&mut self, factor: usize) {
        self.gain.set_decimation(factor);
    }

    /// The gain law, for evaluating the static curve.
    pub fn gain_law(&self) -> &WdrcGain {
        &self.gain
    }

    /// Linear gain applied to the last processed sample.
    pub fn current_gain(&self) -> f32 {
        self.gain.current_gain()
    }

    pub fn current_gain_db(&self) -> f32 {
        self.gain.current_gain_db()
    }

    /// Envelope level in dB SPL (re the `max_db` calibration).
    pub fn current_level_db(&self) -> f32 {
        self.gain.params().max_db + db2(self.envelope.level())
    }

    pub fn reset(&mut self) {
        self.envelope.reset();
    }
}

impl Default for AudioEffectCompWdrc {
    fn default() -> Self {
        AudioEffectCompWdrc::new(WdrcParams::default())
    }
}

impl AudioNode for AudioEffectCompWdrc {
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
        let n = block.len();
        let env = &mut self.env_buf[..n];
        let gains = &mut self.gain_buf[..n];
        self.envelope.process_block(&block, env);
        self.gain.process_block(env, gains);
        block_multiply(&mut block, gains);
        ctx.transmit(&block.into_shared(), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockPool;
    use crate::dsp::helpers::undb2;
    use crate::graph::Graph;
    use crate::test_util::{Capture, Feed};
    use crate::settings::AudioSettings;
    use alloc::vec;
    use alloc::vec::Vec;

    fn linear_params(gain_db: f32) -> WdrcParams {
        WdrcParams {
            tk_gain_db: gain_db,
            tk_db: 0.0,
            cr: 1.0,
            bolt_db: 200.0,
            ..WdrcParams::default()
        }
    }

    #[test]
    fn linear_setting_is_a_fixed_gain() {
        let pool = BlockPool::new(8, AudioSettings::new(24_000.0, 16)).unwrap();
        let mut g = Graph::new(&pool);
        let input: Vec<f32> = (0..16).map(|i| 0.01 * (i as f32 - 8.0)).collect();
        let src = g.add_node(Feed::with([input.clone()]));
        let comp = g.add_node(AudioEffectCompWdrc::default());
        let sink = g.add_node(Capture::default());
        g.connect(src, 0, comp, 0).unwrap();
        g.connect(comp, 0, sink, 0).unwrap();
        g.node_mut::<AudioEffectCompWdrc>(comp)
            .unwrap()
            .set_params_without_expansion(linear_params(6.0));

        g.update_all();
        let out = g.node::<Capture>(sink).unwrap().last().unwrap().to_vec();
        let k = undb2(6.0);
        for (o, i) in out.iter().zip(&input) {
            assert!((o - i * k).abs() < 1e-5, "{} vs {}", o, i * k);
        }
        let c = g.node::<AudioEffectCompWdrc>(comp).unwrap();
        assert!((c.current_gain_db() - 6.0).abs() < 1e-3);
        assert_eq!(g.node::<Capture>(sink).unwrap().ids, vec![1]);
    }

    #[test]
    fn loud_tone_is_compressed() {
        let pool = BlockPool::new(8, AudioSettings::new(24_000.0, 128)).unwrap();
        let mut g = Graph::new(&pool);
        let tone: Vec<f32> = (0..128).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let src = g.add_node(Feed::with(core::iter::repeat(tone).take(20)));
        let comp = g.add_node(AudioEffectCompWdrc::new(WdrcParams {
            tk_db: 60.0,
            cr: 3.0,
            bolt_db: 120.0,
            ..WdrcParams::default()
        }));
        let sink = g.add_node(Capture::default());
        g.connect(src, 0, comp, 0).unwrap();
        g.connect(comp, 0, sink, 0).unwrap();
        for _ in 0..20 {
            g.update_all();
        }
        let c = g.node::<AudioEffectCompWdrc>(comp).unwrap();
        // 0.5 peak ~ 113 dB SPL: 53 dB above the knee at 3:1 -> about -35 dB
        let level = c.current_level_db();
        assert!((level - 112.98).abs() < 0.5, "level {}", level);
        let expected = c.gain_law().gain_db(level);
        assert!((c.current_gain_db() - expected).abs() < 0.1);
        assert!(c.current_gain_db() < -30.0);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn attack_release_update_params() {
        let mut c = AudioEffectCompWdrc::default();
        c.set_attack_release_ms(5.0, 200.0);
        assert_eq!(c.params().attack_ms, 5.0);
        assert_eq!(c.params().release_ms, 200.0);
        c.set_compression_ratio(0.0);
        assert_eq!(c.params().cr, crate::dsp::wdrc::MIN_RATIO);
    }
}
