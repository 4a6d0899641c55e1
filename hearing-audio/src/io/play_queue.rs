//! User-to-graph audio queue.
//!
//! [`AudioPlayQueue`] lets a lower-priority context feed audio into the graph:
//! a [`PlayWriter`] pushes owned [`BlockBuffer`]s, and each tick the node
//! copies at most one of them into a fresh pool block and transmits it.
//!
//! ## Usage
//!
//! ```ignore
//! let play = AudioPlayQueue::new();
//! let writer = play.writer();
//! let src = graph.add_node(play);
//!
//! // In the background loop:
//! writer.play(BlockBuffer::from_samples(&samples, 0))?;
//! ```

use alloc::sync::Arc;

use crate::node::{AudioNode, NodeContext};

use super::buffer::BlockBuffer;
use super::spsc::SpscQueue;

/// Slots in the play ring (one stays empty).
pub const PLAY_QUEUE_SLOTS: usize = 9;

/// Source node fed from a [`PlayWriter`]. 0 inputs, 1 output.
///
/// Transmitted blocks carry the tick number as their id. If the pool is
/// exhausted the buffer stays queued for the next tick.
pub struct AudioPlayQueue {
    queue: Arc<SpscQueue<BlockBuffer, PLAY_QUEUE_SLOTS>>,
    pending: Option<BlockBuffer>,
}

impl AudioPlayQueue {
    pub fn new() -> Self {
        AudioPlayQueue {
            queue: Arc::new(SpscQueue::new()),
            pending: None,
        }
    }

    /// Producer handle. Only one writer may feed the queue at a time.
    pub fn writer(&self) -> PlayWriter {
        PlayWriter {
            queue: self.queue.clone(),
        }
    }
}

impl Default for AudioPlayQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for AudioPlayQueue {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let Some(buf) = self.pending.take().or_else(|| self.queue.pop()) else {
            return;
        };
        let Some(mut block) = ctx.allocate() else {
            self.pending = Some(buf);
            return;
        };
        block.set_len(buf.len());
        block.copy_from_slice(buf.samples());
        ctx.transmit(&block.into_shared(), 0);
    }
}

/// Producer side of an [`AudioPlayQueue`].
pub struct PlayWriter {
    queue: Arc<SpscQueue<BlockBuffer, PLAY_QUEUE_SLOTS>>,
}

impl PlayWriter {
    /// Queue a buffer for playback. Hands it back if the queue is full.
    pub fn play(&self, buffer: BlockBuffer) -> Result<(), BlockBuffer> {
        self.queue.push(buffer)
    }

    /// Number of buffers waiting to be played.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockPool;
    use crate::graph::Graph;
    use crate::test_util::Capture;
    use crate::settings::AudioSettings;

    #[test]
    fn plays_one_buffer_per_tick() {
        let pool = BlockPool::new(4, AudioSettings::new(24_000.0, 4)).unwrap();
        let mut g = Graph::new(&pool);
        let play = AudioPlayQueue::new();
        let writer = play.writer();
        let src = g.add_node(play);
        let sink = g.add_node(Capture::default());
        g.connect(src, 0, sink, 0).unwrap();

        writer.play(BlockBuffer::from_samples(&[0.1, 0.2, 0.3, 0.4], 0)).unwrap();
        writer.play(BlockBuffer::from_samples(&[0.5, 0.6], 0)).unwrap();
        assert_eq!(writer.queued(), 2);

        g.update_all();
        g.update_all();
        g.update_all();
        let cap = g.node::<Capture>(sink).unwrap();
        assert_eq!(cap.blocks.len(), 2, "empty queue must not transmit");
        assert_eq!(cap.blocks[0], [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(cap.blocks[1], [0.5, 0.6]);
        assert_eq!(cap.ids, [1, 2]);
    }

    #[test]
    fn full_queue_hands_buffer_back() {
        let play = AudioPlayQueue::new();
        let writer = play.writer();
        for _ in 0..PLAY_QUEUE_SLOTS - 1 {
            writer.play(BlockBuffer::new()).unwrap();
        }
        assert!(writer.is_full());
        assert!(writer.play(BlockBuffer::from_samples(&[1.0], 7)).is_err());
    }

    #[test]
    fn exhausted_pool_keeps_buffer() {
        let pool = BlockPool::new(1, AudioSettings::new(24_000.0, 2)).unwrap();
        let mut g = Graph::new(&pool);
        let play = AudioPlayQueue::new();
        let writer = play.writer();
        let src = g.add_node(play);
        let sink = g.add_node(Capture::default());
        g.connect(src, 0, sink, 0).unwrap();
        writer.play(BlockBuffer::from_samples(&[0.9, 0.9], 0)).unwrap();

        let hog = pool.allocate().unwrap();
        g.update_all();
        assert!(g.node::<Capture>(sink).unwrap().blocks.is_empty());
        drop(hog);
        g.update_all();
        assert_eq!(g.node::<Capture>(sink).unwrap().blocks.len(), 1);
    }
}
