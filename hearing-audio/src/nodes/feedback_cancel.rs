//! Adaptive feedback cancellation node.
//!
//! Input 0 is the microphone signal. The played output reaches the node
//! through a loopback route registered with
//! [`Graph::add_loopback`](crate::graph::Graph::add_loopback).

use crate::block::AudioBlockRef;
use crate::dsp::nlms::{AfcParams, NlmsCanceller};
use crate::node::{AudioNode, LoopbackReceiver, NodeContext};

/// NLMS feedback canceller. One input, one output, plus the loopback tap.
///
/// # Example
/// ```ignore
/// let afc = graph.add_node(AudioEffectFeedbackCancel::new(AfcParams::default()));
/// graph.connect(mic, 0, afc, 0)?;
/// graph.connect(afc, 0, wdrc, 0)?;
/// graph.connect(wdrc, 0, out, 0)?;
/// graph.add_loopback(wdrc, 0, afc)?;
/// ```
pub struct AudioEffectFeedbackCancel {
    canceller: NlmsCanceller,
}

impl AudioEffectFeedbackCancel {
    pub fn new(params: AfcParams) -> Self {
        AudioEffectFeedbackCancel {
            canceller: NlmsCanceller::new(params),
        }
    }

    pub fn set_params(&mut self, params: AfcParams) {
        self.canceller.set_params(params);
    }

    pub fn params(&self) -> &AfcParams {
        self.canceller.params()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.canceller.set_enabled(enabled);
    }

    pub fn set_filter_len(&mut self, filter_len: usize) -> usize {
        self.canceller.set_filter_len(filter_len)
    }

    pub fn set_mu(&mut self, mu: f32) -> f32 {
        self.canceller.set_mu(mu)
    }

    pub fn set_rho(&mut self, rho: f32) -> f32 {
        self.canceller.set_rho(rho)
    }

    pub fn set_eps(&mut self, eps: f32) -> f32 {
        self.canceller.set_eps(eps)
    }

    /// The adaptive state (coefficients, counters).
    pub fn canceller(&self) -> &NlmsCanceller {
        &self.canceller
    }

    pub fn reset(&mut self) {
        self.canceller.reset();
    }
}

impl Default for AudioEffectFeedbackCancel {
    fn default() -> Self {
        AudioEffectFeedbackCancel::new(AfcParams::default())
    }
}

impl AudioNode for AudioEffectFeedbackCancel {
    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        if !self.canceller.is_enabled() {
            if let Some(block) = ctx.receive_read_only(0) {
                ctx.transmit(&block, 0);
            }
            return;
        }
        let Some(mut block) = ctx.receive_writable(0) else {
            return;
        };
        self.canceller.check_block_continuity(block.id());
        self.canceller.process_in_place(&mut block);
        ctx.transmit(&block.into_shared(), 0);
    }

    fn as_loopback_receiver(&mut self) -> Option<&mut dyn LoopbackReceiver> {
        Some(self)
    }
}

impl LoopbackReceiver for AudioEffectFeedbackCancel {
    fn receive_loopback(&mut self, block: &AudioBlockRef<'_>) {
        self.canceller.receive_loopback(block, block.id());
    }
}
