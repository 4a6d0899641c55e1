//! Audio processing nodes.
//!
//! Each implements the [`AudioNode`](crate::node::AudioNode) trait and is
//! registered with a [`Graph`](crate::graph::Graph).
//!
//! | Node | Inputs | Outputs | Purpose |
//! |------|--------|---------|---------|
//! | [`AudioAmplifier`] | 1 | 1 | linear gain |
//! | [`AudioMixer`] | N | 1 | weighted sum |
//! | [`AudioSynthSine`] | 0 | 1 | test tone source |
//! | [`AudioEffectCompWdrc`] | 1 | 1 | WDRC compressor |
//! | [`AudioEffectFeedbackCancel`] | 1 (+ loopback) | 1 | NLMS feedback canceller |
//! | [`AudioFilterBiquad`] | 1 | 1 | band filter with alignment delay |

mod amplifier;
mod compressor_wdrc;
mod feedback_cancel;
mod filter_biquad;
mod mixer;
mod synth_sine;

pub use amplifier::AudioAmplifier;
pub use compressor_wdrc::AudioEffectCompWdrc;
pub use feedback_cancel::AudioEffectFeedbackCancel;
pub use filter_biquad::AudioFilterBiquad;
pub use mixer::AudioMixer;
pub use synth_sine::AudioSynthSine;
