//! Single-channel amplifier (volume control).

use crate::dsp::helpers::block_scale;
use crate::node::{AudioNode, NodeContext};

/// Single-channel amplifier. One input, one output.
///
/// # Example
/// ```ignore
/// let mut amp = AudioAmplifier::new();
/// amp.gain(0.75); // 75% volume
/// ```
pub struct AudioAmplifier {
    gain: f32,
}

impl AudioAmplifier {
    /// Create a new amplifier at unity gain.
    pub const fn new() -> Self {
        AudioAmplifier { gain: 1.0 }
    }

    /// Set the linear gain: 0.0 = silence, 1.0 = unity, >1.0 = boost.
    pub fn gain(&mut self, level: f32) {
        self.gain = level;
    }

    pub fn current_gain(&self) -> f32 {
        self.gain
    }
}

impl Default for AudioAmplifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for AudioAmplifier {
    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        if self.gain == 0.0 {
            // Zero gain: discard input, transmit nothing (silence)
            drop(ctx.receive_read_only(0));
            return;
        }
        if self.gain == 1.0 {
            // Unity gain: forward the shared block without copying
            if let Some(block) = ctx.receive_read_only(0) {
                ctx.transmit(&block, 0);
            }
            return;
        }
        let Some(mut block) = ctx.receive_writable(0) else {
            return;
        };
        block_scale(&mut block, self.gain);
        ctx.transmit(&block.into_shared(), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockPool;
    use crate::graph::{Graph, NodeId};
    use crate::test_util::{Capture, Feed};
    use crate::settings::AudioSettings;
    use alloc::vec;

    fn run(pool: &BlockPool, gain: f32, input: &[f32]) -> (Option<alloc::vec::Vec<f32>>, usize) {
        let mut g = Graph::new(pool);
        let src = g.add_node(Feed::with([input.to_vec()]));
        let amp = g.add_node(AudioAmplifier::new());
        let sink: NodeId = g.add_node(Capture::default());
        g.connect(src, 0, amp, 0).unwrap();
        g.connect(amp, 0, sink, 0).unwrap();
        g.node_mut::<AudioAmplifier>(amp).unwrap().gain(gain);
        g.update_all();
        let cap = g.node::<Capture>(sink).unwrap();
        (cap.last().map(|s| s.to_vec()), pool.max_in_use())
    }

    fn pool() -> BlockPool {
        BlockPool::new(8, AudioSettings::new(24_000.0, 4)).unwrap()
    }

    #[test]
    fn amplifier_unity_gain_forwards_block() {
        let pool = pool();
        let (out, peak) = run(&pool, 1.0, &[0.1, -0.2, 0.9, -1.0]);
        assert_eq!(out, Some(vec![0.1, -0.2, 0.9, -1.0]));
        assert_eq!(peak, 1, "unity gain must not copy");
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn amplifier_half_gain() {
        let pool = pool();
        let (out, _) = run(&pool, 0.5, &[0.5, -0.5, 1.0, 0.0]);
        assert_eq!(out, Some(vec![0.25, -0.25, 0.5, 0.0]));
    }

    #[test]
    fn amplifier_boost_is_not_clipped() {
        let pool = pool();
        let (out, _) = run(&pool, 4.0, &[0.5, -0.5, 0.0, 0.25]);
        assert_eq!(out, Some(vec![2.0, -2.0, 0.0, 1.0]));
    }

    #[test]
    fn amplifier_zero_gain_produces_no_output() {
        let pool = pool();
        let (out, _) = run(&pool, 0.0, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(out, None);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn amplifier_no_input() {
        let pool = pool();
        let mut g = Graph::new(&pool);
        let src = g.add_node(Feed::default());
        let amp = g.add_node(AudioAmplifier::new());
        let sink = g.add_node(Capture::default());
        g.connect(src, 0, amp, 0).unwrap();
        g.connect(amp, 0, sink, 0).unwrap();
        g.node_mut::<AudioAmplifier>(amp).unwrap().gain(2.0);
        g.update_all();
        assert!(g.node::<Capture>(sink).unwrap().blocks.is_empty());
    }
}
