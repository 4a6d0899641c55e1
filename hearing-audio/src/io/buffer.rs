//! Owned copy of one block, used to move audio in and out of the graph.

use crate::constants::MAX_BLOCK_SAMPLES;

/// Pool-independent block of samples plus its id.
///
/// Queues carry these instead of pool handles so that the consumer can hold
/// on to audio for as long as it likes without starving the pool.
#[derive(Clone, Copy, PartialEq)]
pub struct BlockBuffer {
    samples: [f32; MAX_BLOCK_SAMPLES],
    len: usize,
    id: u32,
}

impl BlockBuffer {
    /// An empty buffer.
    pub const fn new() -> Self {
        BlockBuffer {
            samples: [0.0; MAX_BLOCK_SAMPLES],
            len: 0,
            id: 0,
        }
    }

    /// Copy up to [`MAX_BLOCK_SAMPLES`] samples out of `samples`.
    pub fn from_samples(samples: &[f32], id: u32) -> Self {
        let mut buf = BlockBuffer::new();
        let len = samples.len().min(MAX_BLOCK_SAMPLES);
        buf.samples[..len].copy_from_slice(&samples[..len]);
        buf.len = len;
        buf.id = id;
        buf
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples[..self.len]
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Id of the block this was copied from (0 for user-made buffers).
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for BlockBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockBuffer")
            .field("len", &self.len)
            .field("id", &self.id)
            .finish()
    }
}
