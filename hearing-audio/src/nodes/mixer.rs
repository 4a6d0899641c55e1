//! N-channel audio mixer with per-channel gain.
//!
//! Const generic `N` sets the channel count; the filterbank demo sums its
//! bands with one of these.

use crate::dsp::helpers::{block_accumulate, block_scale};
use crate::node::{AudioNode, NodeContext};

/// N-channel mixer. Mixes N input channels into a single mono output with per-channel gain.
///
/// The output block takes its id and length from the first channel with a
/// pending block; with no pending input nothing is transmitted.
///
/// # Example
/// ```ignore
/// let mut mixer = AudioMixer::<4>::new();
/// mixer.gain(0, 1.0);  // channel 0 at unity
/// mixer.gain(1, 0.5);  // channel 1 at half volume
/// ```
pub struct AudioMixer<const N: usize> {
    gains: [f32; N],
}

impl<const N: usize> AudioMixer<N> {
    /// Create a new mixer with all channels at unity gain.
    pub const fn new() -> Self {
        AudioMixer { gains: [1.0; N] }
    }

    /// Set the linear gain of one channel. Out-of-range channels are ignored.
    pub fn gain(&mut self, channel: usize, level: f32) {
        if let Some(g) = self.gains.get_mut(channel) {
            *g = level;
        }
    }

    pub fn gains(&self) -> &[f32; N] {
        &self.gains
    }
}

impl<const N: usize> Default for AudioMixer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AudioNode for AudioMixer<N> {
    fn num_inputs(&self) -> usize {
        N
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let mut out = None;
        for ch in 0..N {
            let Some(input) = ctx.receive_read_only(ch) else {
                continue;
            };
            let gain = self.gains[ch];
            match out.as_mut() {
                None => {
                    // First active channel: take it over (copy if shared)
                    let Some(mut block) = input.into_mut() else {
                        continue;
                    };
                    if gain != 1.0 {
                        block_scale(&mut block, gain);
                    }
                    out = Some(block);
                }
                Some(acc) => block_accumulate(acc, &input, gain),
            }
        }
        if let Some(block) = out {
            ctx.transmit(&block.into_shared(), 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockPool;
    use crate::graph::Graph;
    use crate::test_util::{Capture, Feed};
    use crate::settings::AudioSettings;
    use alloc::vec;

    fn pool() -> BlockPool {
        BlockPool::new(16, AudioSettings::new(24_000.0, 2)).unwrap()
    }

    #[test]
    fn mixer_two_channels_sum_with_gain() {
        let pool = pool();
        let mut g = Graph::new(&pool);
        let a = g.add_node(Feed::with([vec![0.1, 0.2]]));
        let b = g.add_node(Feed::with([vec![0.4, -0.4]]));
        let mix = g.add_node(AudioMixer::<2>::new());
        let sink = g.add_node(Capture::default());
        g.connect(a, 0, mix, 0).unwrap();
        g.connect(b, 0, mix, 1).unwrap();
        g.connect(mix, 0, sink, 0).unwrap();
        g.node_mut::<AudioMixer<2>>(mix).unwrap().gain(1, 0.5);

        g.update_all();
        let out = g.node::<Capture>(sink).unwrap().last().unwrap().to_vec();
        assert!((out[0] - 0.3).abs() < 1e-6, "got {:?}", out);
        assert!((out[1] - 0.0).abs() < 1e-6, "got {:?}", out);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn mixer_keeps_block_id() {
        let pool = pool();
        let mut g = Graph::new(&pool);
        let a = g.add_node(Feed::with([vec![0.0, 0.0], vec![0.0, 0.0]]));
        let mix = g.add_node(AudioMixer::<1>::new());
        let sink = g.add_node(Capture::default());
        g.connect(a, 0, mix, 0).unwrap();
        g.connect(mix, 0, sink, 0).unwrap();
        g.update_all();
        g.update_all();
        assert_eq!(g.node::<Capture>(sink).unwrap().ids, vec![1, 2]);
    }

    #[test]
    fn mixer_only_last_channel_active() {
        let pool = pool();
        let mut g = Graph::new(&pool);
        let src = g.add_node(Feed::with([vec![0.8, -0.8]]));
        let mix = g.add_node(AudioMixer::<8>::new());
        let sink = g.add_node(Capture::default());
        g.connect(src, 0, mix, 7).unwrap();
        g.connect(mix, 0, sink, 0).unwrap();
        g.node_mut::<AudioMixer<8>>(mix).unwrap().gain(7, 0.5);
        g.update_all();
        assert_eq!(g.node::<Capture>(sink).unwrap().last(), Some(&[0.4f32, -0.4][..]));
    }

    #[test]
    fn mixer_no_inputs_transmits_nothing() {
        let pool = pool();
        let mut g = Graph::new(&pool);
        let src = g.add_node(Feed::default());
        let mix = g.add_node(AudioMixer::<2>::new());
        let sink = g.add_node(Capture::default());
        g.connect(src, 0, mix, 0).unwrap();
        g.connect(mix, 0, sink, 0).unwrap();
        g.update_all();
        assert!(g.node::<Capture>(sink).unwrap().blocks.is_empty());
    }

    #[test]
    fn mixer_gain_out_of_range_ignored() {
        let mut mixer = AudioMixer::<2>::new();
        mixer.gain(5, 0.0);
        assert_eq!(mixer.gains(), &[1.0, 1.0]);
    }
}
