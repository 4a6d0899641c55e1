//! # hearing-audio
//!
//! A block-based real-time audio framework with the DSP of a hearing aid:
//! wide-dynamic-range compression, adaptive feedback cancellation, and an
//! offline IIR filterbank designer.
//!
//! The runtime half builds without `std`: blocks come from a fixed
//! [`BlockPool`](block::BlockPool) of refcounted buffers, nodes run once per
//! tick in registration order, and nothing on the tick path allocates or
//! blocks.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`block`] | Fixed-size audio block pool with refcounted handles |
//! | Trait | [`node`] | `AudioNode`, `LoopbackReceiver`, per-tick `NodeContext` |
//! | Graph | [`graph`] | Node registry, connections, loopback routes, tick scheduler |
//! | I/O | [`io`] | Play/record queues between the tick and background contexts |
//! | DSP | [`dsp`] / [`nodes`] | Envelope, WDRC, NLMS, biquads and their nodes (feature-gated) |
//! | Design | [`design`] | Butterworth filterbank synthesis (feature-gated, needs `std`) |
//!
//! ## Quick start
//!
//! ```ignore
//! use hearing_audio::prelude::*;
//!
//! let pool = BlockPool::new(32, AudioSettings::new(24_000.0, 32))?;
//! let mut graph = Graph::new(&pool);
//!
//! let play = AudioPlayQueue::new();
//! let mic_writer = play.writer();
//! let mic = graph.add_node(play);
//! let afc = graph.add_node(AudioEffectFeedbackCancel::new(AfcParams::default()));
//! let wdrc = graph.add_node(AudioEffectCompWdrc::new(WdrcParams::default()));
//! let mut rec = AudioRecordQueue::new();
//! rec.start();
//! let speaker = rec.reader();
//! let out = graph.add_node(rec);
//!
//! graph.connect(mic, 0, afc, 0)?;
//! graph.connect(afc, 0, wdrc, 0)?;
//! graph.connect(wdrc, 0, out, 0)?;
//! graph.add_loopback(wdrc, 0, afc)?;
//!
//! // In the audio interrupt:
//! graph.update_all();
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `std` | yes | `std` support in dependencies |
//! | `dsp` | yes | DSP building blocks and processing nodes |
//! | `design` | yes | Filterbank designer (`std`, `rustfft`) |
//! | `tracing` | yes | Structured logging through `tracing` |
//! | `serde` | no | `Serialize`/`Deserialize` on parameter records |

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod settings;
pub mod error;
pub mod block;
pub mod node;
pub mod io;
pub mod graph;

#[cfg(feature = "dsp")]
pub mod dsp;

#[cfg(feature = "dsp")]
pub mod nodes;

#[cfg(feature = "design")]
pub mod design;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::ConfigError;
pub use settings::AudioSettings;

/// Everything needed to build and run a processing chain.
pub mod prelude {
    pub use crate::block::{AudioBlockMut, AudioBlockRef, BlockPool};
    pub use crate::error::ConfigError;
    pub use crate::graph::{Graph, GraphError, NodeId};
    pub use crate::io::{AudioPlayQueue, AudioRecordQueue, BlockBuffer, PlayWriter, RecordReader};
    pub use crate::node::{AudioNode, LoopbackReceiver, NodeContext};
    pub use crate::settings::AudioSettings;

    #[cfg(feature = "dsp")]
    pub use crate::dsp::{nlms::AfcParams, wdrc::WdrcParams};
    #[cfg(feature = "dsp")]
    pub use crate::nodes::*;

    #[cfg(feature = "design")]
    pub use crate::design::{DesignConfig, DesignError, FilterbankDesign, FilterbankDesigner};
}
