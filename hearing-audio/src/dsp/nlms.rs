//! NLMS adaptive feedback canceller.
//!
//! The canceller models the acoustic path from the receiver back to the
//! microphone as an FIR filter. The filter is driven by a loopback tap of the
//! signal that was actually played; its output (the feedback estimate) is
//! subtracted from the microphone signal and the coefficients adapt toward
//! minimizing the residual, normalized by a smoothed power estimate.
//!
//! The loopback history is stored newest-first: index 0 is the most recently
//! played sample. For forward sample `i` of a block of length `n`, the window
//! starting at `n - 1 - i` lines the history up so that coefficient `j`
//! multiplies the played sample `j` steps earlier.

use crate::constants::{MAX_AFC_FILTER_LEN, MAX_BLOCK_SAMPLES};
use crate::dsp::helpers::{dot, scale_add};

/// Block ids below this are ignored by the falling-behind check (start-up).
pub const CONTINUITY_WARMUP_TICKS: u32 = 100;

const RING_LEN: usize = MAX_AFC_FILTER_LEN + MAX_BLOCK_SAMPLES;

/// Flat AFC parameter record.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AfcParams {
    /// When false, audio passes through untouched (loopback is still ingested).
    pub enabled: bool,
    /// Adaptive filter length in taps, `1..=MAX_AFC_FILTER_LEN`.
    pub filter_len: usize,
    /// Adaptation step size.
    pub mu: f32,
    /// Smoothing factor of the power estimate, `0..=1`.
    pub rho: f32,
    /// Regularization added to the power estimate, `1e-30..=1`.
    pub eps: f32,
}

impl Default for AfcParams {
    fn default() -> Self {
        AfcParams {
            enabled: true,
            filter_len: 100,
            mu: 1.0e-3,
            rho: 0.9,
            eps: 0.008,
        }
    }
}

impl AfcParams {
    /// Return a copy with every field clamped into its legal range.
    pub fn clamped(self) -> Self {
        AfcParams {
            enabled: self.enabled,
            filter_len: self.filter_len.clamp(1, MAX_AFC_FILTER_LEN),
            mu: if self.mu > 0.0 { self.mu } else { 0.0 },
            rho: self.rho.clamp(0.0, 1.0),
            eps: self.eps.clamp(1.0e-30, 1.0),
        }
    }
}

/// Newest-first history of played samples.
///
/// Holds enough history for the longest filter plus one block, so a window of
/// `filter_len` samples can start anywhere within the most recent block.
#[derive(Clone)]
pub struct LoopbackRing {
    buf: [f32; RING_LEN],
}

impl LoopbackRing {
    pub const fn new() -> Self {
        LoopbackRing {
            buf: [0.0; RING_LEN],
        }
    }

    /// Append a block of played samples (oldest first in `block`), keeping the
    /// `keep` most recent samples of older history behind it.
    pub fn push_block(&mut self, block: &[f32], keep: usize) {
        let n = block.len().min(MAX_BLOCK_SAMPLES);
        let keep = keep.min(MAX_AFC_FILTER_LEN);
        self.buf.copy_within(0..keep, n);
        for (dst, &src) in self.buf[..n].iter_mut().zip(block[..n].iter().rev()) {
            *dst = src;
        }
    }

    /// `len` samples starting `offset` samples back from the newest, newest first.
    pub fn window(&self, offset: usize, len: usize) -> &[f32] {
        let start = offset.min(RING_LEN);
        let end = (start + len).min(RING_LEN);
        &self.buf[start..end]
    }

    pub fn clear(&mut self) {
        self.buf = [0.0; RING_LEN];
    }
}

impl Default for LoopbackRing {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for LoopbackRing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoopbackRing")
            .field("len", &RING_LEN)
            .finish()
    }
}

/// NLMS feedback canceller state.
#[derive(Debug, Clone)]
pub struct NlmsCanceller {
    params: AfcParams,
    ring: LoopbackRing,
    coefficients: [f32; MAX_AFC_FILTER_LEN],
    power: f32,
    last_loopback_id: Option<u32>,
    falling_behind_count: u32,
    reset_count: u32,
}

impl NlmsCanceller {
    pub fn new(params: AfcParams) -> Self {
        NlmsCanceller {
            params: params.clamped(),
            ring: LoopbackRing::new(),
            coefficients: [0.0; MAX_AFC_FILTER_LEN],
            power: 0.0,
            last_loopback_id: None,
            falling_behind_count: 0,
            reset_count: 0,
        }
    }

    pub fn params(&self) -> &AfcParams {
        &self.params
    }

    /// Replace the parameter record (clamped). A shorter filter zeroes the
    /// coefficients it no longer uses.
    pub fn set_params(&mut self, params: AfcParams) {
        let params = params.clamped();
        if params.filter_len < self.params.filter_len {
            self.coefficients[params.filter_len..].fill(0.0);
        }
        self.params = params;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    /// Set the filter length; returns the clamped value in effect.
    pub fn set_filter_len(&mut self, filter_len: usize) -> usize {
        self.set_params(AfcParams {
            filter_len,
            ..self.params
        });
        self.params.filter_len
    }

    pub fn set_mu(&mut self, mu: f32) -> f32 {
        self.set_params(AfcParams { mu, ..self.params });
        self.params.mu
    }

    pub fn set_rho(&mut self, rho: f32) -> f32 {
        self.set_params(AfcParams { rho, ..self.params });
        self.params.rho
    }

    pub fn set_eps(&mut self, eps: f32) -> f32 {
        self.set_params(AfcParams { eps, ..self.params });
        self.params.eps
    }

    /// Current estimate of the feedback impulse response.
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients[..self.params.filter_len]
    }

    /// Smoothed power estimate used for step normalization.
    pub fn power(&self) -> f32 {
        self.power
    }

    /// Clear history, coefficients and power estimate.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.coefficients = [0.0; MAX_AFC_FILTER_LEN];
        self.power = 0.0;
        self.last_loopback_id = None;
    }

    /// Cancel feedback from `block` in place, adapting as it goes.
    pub fn process_in_place(&mut self, block: &mut [f32]) {
        if !self.params.enabled {
            return;
        }
        let n = block.len().min(MAX_BLOCK_SAMPLES);
        let AfcParams {
            filter_len,
            mu,
            rho,
            eps,
            ..
        } = self.params;
        let coef = &mut self.coefficients[..filter_len];
        for (i, sample) in block[..n].iter_mut().enumerate() {
            let history = self.ring.window(n - 1 - i, filter_len);
            let s0 = *sample;
            let s1 = s0 - dot(history, coef);
            self.power = rho * self.power + s0 * s0 + s1 * s1;
            let step = mu / (eps + self.power);
            scale_add(coef, history, step * s1);
            *sample = s1;
        }
    }

    /// Cancel feedback from `input` into `output`.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        self.process_in_place(&mut output[..n]);
    }

    /// Ingest a block of played audio. A block containing a non-finite sample
    /// resets the canceller and is discarded; returns `false` in that case.
    pub fn receive_loopback(&mut self, samples: &[f32], id: u32) -> bool {
        if samples.iter().any(|s| !s.is_finite()) {
            self.reset();
            self.reset_count = self.reset_count.wrapping_add(1);
            #[cfg(feature = "tracing")]
            tracing::warn!(id, "feedback canceller reset on non-finite loopback audio");
            return false;
        }
        self.ring.push_block(samples, self.params.filter_len);
        self.last_loopback_id = Some(id);
        true
    }

    /// Compare the forward block id with the latest loopback id. Returns `false`
    /// (and counts the event) when the two have drifted more than one block apart.
    pub fn check_block_continuity(&mut self, forward_id: u32) -> bool {
        let Some(loopback_id) = self.last_loopback_id else {
            return true;
        };
        if forward_id <= CONTINUITY_WARMUP_TICKS || forward_id.abs_diff(loopback_id) <= 1 {
            return true;
        }
        self.falling_behind_count = self.falling_behind_count.wrapping_add(1);
        #[cfg(feature = "tracing")]
        tracing::warn!(
            forward_id,
            loopback_id,
            "feedback canceller falling behind the audio stream"
        );
        false
    }

    pub fn last_loopback_id(&self) -> Option<u32> {
        self.last_loopback_id
    }

    /// Number of falling-behind events detected.
    pub fn falling_behind_count(&self) -> u32 {
        self.falling_behind_count
    }

    /// Number of self-resets caused by invalid loopback audio.
    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }
}

impl Default for NlmsCanceller {
    fn default() -> Self {
        NlmsCanceller::new(AfcParams::default())
    }
}
