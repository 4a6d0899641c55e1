//! Per-sample DSP building blocks operating on plain slices.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`helpers`] | dB conversion, block gain/accumulate, dot product |
//! | [`envelope`] | attack/release envelope follower |
//! | [`wdrc`] | wide-dynamic-range compression gain law |
//! | [`nlms`] | NLMS adaptive feedback canceller and its loopback ring |
//! | [`biquad`] | second-order-section cascade with integer delay |

pub mod biquad;
pub mod envelope;
pub mod helpers;
pub mod nlms;
pub mod wdrc;
