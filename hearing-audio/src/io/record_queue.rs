//! Graph-to-user audio queue.
//!
//! [`AudioRecordQueue`] copies the blocks reaching its input into owned
//! [`BlockBuffer`]s so a lower-priority context can analyze, log, or stream
//! them without holding pool blocks.
//!
//! ## Usage
//!
//! ```ignore
//! let rec = AudioRecordQueue::new();
//! let reader = rec.reader();
//! let rec_id = graph.add_node(rec);
//! graph.connect(wdrc, 0, rec_id, 0)?;
//! graph.node_mut::<AudioRecordQueue>(rec_id).unwrap().start();
//!
//! // In the background loop:
//! while let Some(buf) = reader.read() {
//!     // inspect buf.samples()
//! }
//! ```

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::node::{AudioNode, NodeContext};

use super::buffer::BlockBuffer;
use super::spsc::SpscQueue;

/// Slots in the record ring (one stays empty).
pub const RECORD_QUEUE_SLOTS: usize = 53;

struct RecordShared {
    queue: SpscQueue<BlockBuffer, RECORD_QUEUE_SLOTS>,
    overflows: AtomicU32,
}

/// Sink node that hands copies of its input to a [`RecordReader`].
///
/// Recording must be started with [`start()`](Self::start); while stopped,
/// incoming blocks are released without copying. A full queue drops the
/// block and counts an overflow.
pub struct AudioRecordQueue {
    shared: Arc<RecordShared>,
    recording: bool,
}

impl AudioRecordQueue {
    /// Create a new record queue (recording is initially stopped).
    pub fn new() -> Self {
        AudioRecordQueue {
            shared: Arc::new(RecordShared {
                queue: SpscQueue::new(),
                overflows: AtomicU32::new(0),
            }),
            recording: false,
        }
    }

    /// Consumer handle. Only one reader may drain the queue at a time.
    pub fn reader(&self) -> RecordReader {
        RecordReader {
            shared: self.shared.clone(),
        }
    }

    pub fn start(&mut self) {
        self.recording = true;
    }

    /// Stop recording. Queued buffers can still be read.
    pub fn stop(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

impl Default for AudioRecordQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for AudioRecordQueue {
    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        0
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let Some(block) = ctx.receive_read_only(0) else {
            return;
        };
        if !self.recording {
            return;
        }
        let buf = BlockBuffer::from_samples(&block, block.id());
        if self.shared.queue.push(buf).is_err() {
            self.shared.overflows.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Consumer side of an [`AudioRecordQueue`].
pub struct RecordReader {
    shared: Arc<RecordShared>,
}

impl RecordReader {
    /// Oldest captured block, if any.
    pub fn read(&self) -> Option<BlockBuffer> {
        self.shared.queue.pop()
    }

    /// Number of captured blocks waiting.
    pub fn available(&self) -> usize {
        self.shared.queue.len()
    }

    /// Discard everything waiting.
    pub fn clear(&self) -> usize {
        self.shared.queue.clear()
    }

    /// Blocks dropped because the queue was full.
    pub fn overflow_count(&self) -> u32 {
        self.shared.overflows.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockPool;
    use crate::graph::Graph;
    use crate::settings::AudioSettings;
    use crate::test_util::Feed;

    fn setup(pool: &BlockPool) -> (Graph<'_>, crate::graph::NodeId, RecordReader) {
        let mut g = Graph::new(pool);
        let len = pool.settings().block_samples;
        let src = g.add_node(Feed::with((0..100).map(|_| alloc::vec![0.5; len])));
        let rec = AudioRecordQueue::new();
        let reader = rec.reader();
        let rec = g.add_node(rec);
        g.connect(src, 0, rec, 0).unwrap();
        (g, rec, reader)
    }

    #[test]
    fn stopped_queue_records_nothing() {
        let pool = BlockPool::new(4, AudioSettings::new(24_000.0, 32)).unwrap();
        let (mut g, _rec, reader) = setup(&pool);
        g.update_all();
        assert_eq!(reader.available(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn records_copies_in_order() {
        let pool = BlockPool::new(4, AudioSettings::new(24_000.0, 32)).unwrap();
        let (mut g, rec, reader) = setup(&pool);
        g.node_mut::<AudioRecordQueue>(rec).unwrap().start();
        for _ in 0..3 {
            g.update_all();
        }
        assert_eq!(pool.in_use(), 0, "recorded audio must not hold pool blocks");
        let ids: alloc::vec::Vec<u32> = core::iter::from_fn(|| reader.read())
            .map(|b| {
                assert_eq!(b.len(), 32);
                b.id()
            })
            .collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn overflow_is_counted() {
        let pool = BlockPool::new(4, AudioSettings::new(24_000.0, 8)).unwrap();
        let (mut g, rec, reader) = setup(&pool);
        g.node_mut::<AudioRecordQueue>(rec).unwrap().start();
        for _ in 0..RECORD_QUEUE_SLOTS + 4 {
            g.update_all();
        }
        assert_eq!(reader.available(), RECORD_QUEUE_SLOTS - 1);
        assert_eq!(reader.overflow_count(), 5);
        assert_eq!(reader.clear(), RECORD_QUEUE_SLOTS - 1);
    }
}
