//! Source and sink nodes shared by the node tests.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::node::{AudioNode, NodeContext};

/// Source that transmits one queued buffer per tick (nothing once drained).
#[derive(Default)]
pub(crate) struct Feed {
    pub(crate) queue: VecDeque<Vec<f32>>,
}

impl Feed {
    pub(crate) fn with(buffers: impl IntoIterator<Item = Vec<f32>>) -> Self {
        Feed {
            queue: buffers.into_iter().collect(),
        }
    }
}

impl AudioNode for Feed {
    fn num_inputs(&self) -> usize {
        0
    }
    fn num_outputs(&self) -> usize {
        1
    }
    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let Some(samples) = self.queue.pop_front() else {
            return;
        };
        if let Some(mut block) = ctx.allocate() {
            block.set_len(samples.len());
            block.copy_from_slice(&samples);
            ctx.transmit(&block.into_shared(), 0);
        }
    }
}

/// Sink that keeps a copy of every block it receives.
#[derive(Default)]
pub(crate) struct Capture {
    pub(crate) blocks: Vec<Vec<f32>>,
    pub(crate) ids: Vec<u32>,
}

impl Capture {
    pub(crate) fn last(&self) -> Option<&[f32]> {
        self.blocks.last().map(Vec::as_slice)
    }
}

impl AudioNode for Capture {
    fn num_inputs(&self) -> usize {
        1
    }
    fn num_outputs(&self) -> usize {
        0
    }
    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        if let Some(block) = ctx.receive_read_only(0) {
            self.blocks.push(block.to_vec());
            self.ids.push(block.id());
        }
    }
}
