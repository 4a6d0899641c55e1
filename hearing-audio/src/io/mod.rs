//! Hand-off between the tick context and the rest of the program.
//!
//! The graph runs in a high-priority context and must never block. These
//! nodes copy audio into and out of owned [`BlockBuffer`]s that travel
//! through lock-free SPSC rings, so the other side can run at its own pace.
//!
//! | Node | Inputs | Outputs | Handle | Description |
//! |------|--------|---------|--------|-------------|
//! | [`AudioPlayQueue`] | 0 | 1 | [`PlayWriter`] | user code → graph |
//! | [`AudioRecordQueue`] | 1 | 0 | [`RecordReader`] | graph → user code |

pub mod buffer;
pub mod play_queue;
pub mod record_queue;
pub mod spsc;

pub use buffer::BlockBuffer;
pub use play_queue::{AudioPlayQueue, PlayWriter};
pub use record_queue::{AudioRecordQueue, RecordReader};
pub use spsc::SpscQueue;

#[cfg(test)]
mod integration_tests;
