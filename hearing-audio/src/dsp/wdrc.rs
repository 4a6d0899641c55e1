//! Wide-dynamic-range compression gain law.
//!
//! Maps an envelope level (dB re the `max_db` calibration) to a gain through four
//! regions:
//!
//! | Region | Input level | Gain (dB) |
//! |--------|-------------|-----------|
//! | Expansion | `L < exp_end_knee` | rises with slope `1/exp_cr - 1` toward the knee |
//! | Linear | `exp_end_knee <= L < tk` (`cr >= 1`) | `tk_gain` |
//! | Compression | `tk <= L <= pblt` | `(1/cr - 1) * L + tkgo` |
//! | Limiting | `L > pblt` | `bolt + (L - pblt) / 10 - L` |
//!
//! The compression knee is clamped so that `tk + tk_gain <= bolt`, which keeps
//! the regions ordered and the curve continuous at every boundary.

use crate::dsp::helpers::{db2, undb2};

/// Smallest accepted compression or expansion ratio.
pub const MIN_RATIO: f32 = 0.01;

/// Expansion knee used when expansion is switched off.
pub const EXPANSION_OFF_KNEE_DB: f32 = -200.0;

/// Flat WDRC parameter record, the shape stored in presets.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WdrcParams {
    /// Envelope attack time (ms).
    pub attack_ms: f32,
    /// Envelope release time (ms).
    pub release_ms: f32,
    pub sample_rate_hz: f32,
    /// Level (dB SPL) corresponding to a full-scale envelope of 1.0.
    pub max_db: f32,
    /// Expansion ratio; 1.0 disables expansion.
    pub exp_cr: f32,
    /// Level below which expansion applies (dB SPL).
    pub exp_end_knee_db: f32,
    /// Linear-region gain (dB).
    pub tk_gain_db: f32,
    /// Compression knee (dB SPL).
    pub tk_db: f32,
    /// Compression ratio.
    pub cr: f32,
    /// Broadband output limiting threshold (dB SPL).
    pub bolt_db: f32,
}

impl Default for WdrcParams {
    fn default() -> Self {
        WdrcParams {
            attack_ms: 1.0,
            release_ms: 50.0,
            sample_rate_hz: 24_000.0,
            max_db: 119.0,
            exp_cr: 1.0,
            exp_end_knee_db: 0.0,
            tk_gain_db: 0.0,
            tk_db: 105.0,
            cr: 10.0,
            bolt_db: 105.0,
        }
    }
}

/// WDRC gain calculator: envelope in, linear gain out.
///
/// Derived quantities are recomputed by every setter. With a decimation factor
/// `K > 1` the gain is evaluated on every `K`th sample and held in between; the
/// phase carries across blocks.
#[derive(Debug, Clone)]
pub struct WdrcGain {
    params: WdrcParams,
    tk_eff: f32,
    cr_const: f32,
    tkgo: f32,
    pblt: f32,
    exp_cr_const: f32,
    gain_at_exp_end_knee: f32,
    decimation: usize,
    phase: usize,
    held_gain: f32,
    last_gain: f32,
    last_level_db: f32,
}

impl WdrcGain {
    pub fn new(params: WdrcParams) -> Self {
        let mut gain = WdrcGain {
            params,
            tk_eff: 0.0,
            cr_const: 0.0,
            tkgo: 0.0,
            pblt: 0.0,
            exp_cr_const: 0.0,
            gain_at_exp_end_knee: 0.0,
            decimation: 1,
            phase: 0,
            held_gain: 1.0,
            last_gain: 1.0,
            last_level_db: f32::NEG_INFINITY,
        };
        gain.set_params(params);
        gain
    }

    /// Replace the whole parameter record. Ratios are clamped to [`MIN_RATIO`].
    pub fn set_params(&mut self, params: WdrcParams) {
        self.params = params;
        self.params.cr = params.cr.max(MIN_RATIO);
        self.params.exp_cr = params.exp_cr.max(MIN_RATIO);
        self.recompute();
    }

    /// Apply `params` with expansion switched off (ratio 1, knee at -200 dB).
    pub fn set_params_without_expansion(&mut self, params: WdrcParams) {
        self.set_params(WdrcParams {
            exp_cr: 1.0,
            exp_end_knee_db: EXPANSION_OFF_KNEE_DB,
            ..params
        });
    }

    pub fn params(&self) -> &WdrcParams {
        &self.params
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.params.tk_gain_db = gain_db;
        self.recompute();
    }

    /// Add `delta_db` to the linear-region gain. Returns the new gain.
    pub fn increment_gain_db(&mut self, delta_db: f32) -> f32 {
        self.set_gain_db(self.params.tk_gain_db + delta_db);
        self.params.tk_gain_db
    }

    pub fn set_max_db(&mut self, max_db: f32) {
        self.params.max_db = max_db;
        self.recompute();
    }

    pub fn set_expansion_knee_db(&mut self, knee_db: f32) {
        self.params.exp_end_knee_db = knee_db;
        self.recompute();
    }

    pub fn set_expansion_ratio(&mut self, ratio: f32) {
        self.params.exp_cr = ratio.max(MIN_RATIO);
        self.recompute();
    }

    pub fn set_compression_knee_db(&mut self, knee_db: f32) {
        self.params.tk_db = knee_db;
        self.recompute();
    }

    pub fn set_compression_ratio(&mut self, ratio: f32) {
        self.params.cr = ratio.max(MIN_RATIO);
        self.recompute();
    }

    pub fn set_limiter_knee_db(&mut self, bolt_db: f32) {
        self.params.bolt_db = bolt_db;
        self.recompute();
    }

    /// Evaluate the gain on every `factor`th sample (minimum 1) and hold it between.
    pub fn set_decimation(&mut self, factor: usize) {
        self.decimation = factor.max(1);
        self.phase = 0;
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Compression knee after clamping against the limiter (`tk'`).
    pub fn effective_knee_db(&self) -> f32 {
        self.tk_eff
    }

    /// Input level at which limiting begins (`pblt`).
    pub fn limiting_start_db(&self) -> f32 {
        self.pblt
    }

    /// Gain in dB for an input level in dB SPL.
    pub fn gain_db(&self, level_db: f32) -> f32 {
        let p = &self.params;
        if level_db < p.exp_end_knee_db {
            self.gain_at_exp_end_knee - (p.exp_end_knee_db - level_db) * self.exp_cr_const
        } else if level_db < self.tk_eff && p.cr >= 1.0 {
            p.tk_gain_db
        } else if level_db > self.pblt {
            p.bolt_db + (level_db - self.pblt) / 10.0 - level_db
        } else {
            self.cr_const * level_db + self.tkgo
        }
    }

    /// Convert envelope samples (linear, re full scale) into linear gains.
    pub fn process_block(&mut self, envelope: &[f32], gains: &mut [f32]) {
        for (&env, gain) in envelope.iter().zip(gains.iter_mut()) {
            if self.phase == 0 {
                let level_db = self.params.max_db + db2(env);
                self.held_gain = undb2(self.gain_db(level_db));
                self.last_level_db = level_db;
            }
            self.phase += 1;
            if self.phase >= self.decimation {
                self.phase = 0;
            }
            *gain = self.held_gain;
        }
        if !gains.is_empty() {
            self.last_gain = self.held_gain;
        }
    }

    /// Most recent linear gain produced by [`process_block`](Self::process_block).
    pub fn current_gain(&self) -> f32 {
        self.last_gain
    }

    pub fn current_gain_db(&self) -> f32 {
        db2(self.last_gain)
    }

    /// Input level (dB SPL) at the most recent gain evaluation.
    pub fn current_level_db(&self) -> f32 {
        self.last_level_db
    }

    fn recompute(&mut self) {
        let p = &self.params;
        self.tk_eff = if p.tk_db + p.tk_gain_db > p.bolt_db {
            p.bolt_db - p.tk_gain_db
        } else {
            p.tk_db
        };
        self.cr_const = 1.0 / p.cr - 1.0;
        self.tkgo = p.tk_gain_db - self.tk_eff * self.cr_const;
        self.pblt = p.cr * (p.bolt_db - self.tkgo);
        self.exp_cr_const = 1.0 / p.exp_cr - 1.0;
        self.gain_at_exp_end_knee = if self.tk_eff < p.exp_end_knee_db {
            self.cr_const * p.exp_end_knee_db + self.tkgo
        } else {
            p.tk_gain_db
        };
    }
}

impl Default for WdrcGain {
    fn default() -> Self {
        WdrcGain::new(WdrcParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(tk_gain_db: f32, tk_db: f32, cr: f32, bolt_db: f32) -> WdrcParams {
        WdrcParams {
            tk_gain_db,
            tk_db,
            cr,
            bolt_db,
            ..WdrcParams::default()
        }
    }

    // ── Regions ─────────────────────────────────────────────────────────

    #[test]
    fn linear_region_is_flat() {
        let g = WdrcGain::new(params(20.0, 50.0, 3.0, 100.0));
        for level in [10.0, 30.0, 49.9] {
            assert_eq!(g.gain_db(level), 20.0, "level {}", level);
        }
    }

    #[test]
    fn compression_slope() {
        let g = WdrcGain::new(params(20.0, 50.0, 2.0, 120.0));
        // 10 dB more input gives 5 dB more output, i.e. 5 dB less gain.
        let a = g.gain_db(60.0);
        let b = g.gain_db(70.0);
        assert!((a - b - 5.0).abs() < 1e-4, "gain {} -> {}", a, b);
        assert!((g.gain_db(50.0) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn limiting_slope_is_ten_to_one() {
        let g = WdrcGain::new(params(20.0, 50.0, 2.0, 90.0));
        let start = g.limiting_start_db();
        let out_a = start + 1.0 + g.gain_db(start + 1.0);
        let out_b = start + 11.0 + g.gain_db(start + 11.0);
        assert!((out_b - out_a - 1.0).abs() < 1e-3, "output rose {}", out_b - out_a);
    }

    #[test]
    fn knee_clamped_below_limiter() {
        let g = WdrcGain::new(params(30.0, 90.0, 3.0, 100.0));
        assert_eq!(g.effective_knee_db(), 70.0);
        assert!(g.effective_knee_db() <= g.limiting_start_db() + 1e-3);
    }

    #[test]
    fn expansion_reduces_gain_below_knee() {
        let mut g = WdrcGain::new(params(10.0, 60.0, 2.0, 110.0));
        g.set_expansion_ratio(0.5);
        g.set_expansion_knee_db(40.0);
        assert!((g.gain_db(40.0) - 10.0).abs() < 1e-4);
        // exp_cr = 0.5 -> slope 1: 10 dB below the knee loses 10 dB of gain
        assert!((g.gain_db(30.0) - 0.0).abs() < 1e-4);
    }

    #[test]
    fn continuous_at_boundaries() {
        let mut g = WdrcGain::new(params(15.0, 55.0, 3.0, 100.0));
        g.set_expansion_ratio(0.7);
        g.set_expansion_knee_db(35.0);
        let eps = 1e-3;
        for knee in [35.0, g.effective_knee_db(), g.limiting_start_db()] {
            let below = g.gain_db(knee - eps);
            let above = g.gain_db(knee + eps);
            assert!((below - above).abs() < 0.01, "jump at {}: {} vs {}", knee, below, above);
        }
    }

    #[test]
    fn unity_ratio_is_constant_gain() {
        let mut g = WdrcGain::default();
        g.set_params_without_expansion(params(12.0, 0.0, 1.0, 105.0));
        let limit = g.limiting_start_db();
        assert_eq!(limit, 93.0);
        let mut level = -100.0;
        while level < limit {
            assert!((g.gain_db(level) - 12.0).abs() < 1e-4, "level {}", level);
            level += 0.5;
        }
    }

    // ── Setters ─────────────────────────────────────────────────────────

    #[test]
    fn setters_clamp_and_recompute() {
        let mut g = WdrcGain::default();
        g.set_compression_ratio(0.0);
        assert_eq!(g.params().cr, MIN_RATIO);
        g.set_expansion_ratio(-3.0);
        assert_eq!(g.params().exp_cr, MIN_RATIO);

        g.set_compression_ratio(2.0);
        g.set_compression_knee_db(60.0);
        g.set_limiter_knee_db(110.0);
        g.set_gain_db(10.0);
        assert_eq!(g.increment_gain_db(5.0), 15.0);
        assert!((g.gain_db(40.0) - 15.0).abs() < 1e-4);
        g.set_max_db(100.0);
        assert_eq!(g.params().max_db, 100.0);
    }

    // ── Block processing ────────────────────────────────────────────────

    #[test]
    fn process_block_uses_max_db_reference() {
        let mut g = WdrcGain::new(params(0.0, 105.0, 10.0, 105.0));
        // envelope 1.0 == max_db (119 dB) which is above pblt (105): limiting
        let env = [1.0f32; 4];
        let mut gains = [0.0f32; 4];
        g.process_block(&env, &mut gains);
        let expected = undb2(105.0 + (119.0 - 105.0) / 10.0 - 119.0);
        assert!((gains[3] - expected).abs() < 1e-5);
        assert!((g.current_gain() - expected).abs() < 1e-6);
        assert!((g.current_level_db() - 119.0).abs() < 1e-4);
    }

    #[test]
    fn decimation_holds_gain() {
        let mut g = WdrcGain::new(params(0.0, 40.0, 4.0, 120.0));
        g.set_decimation(4);
        let env = [0.001f32, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5];
        let mut gains = [0.0f32; 8];
        g.process_block(&env, &mut gains);
        assert_eq!(gains[0], gains[1]);
        assert_eq!(gains[0], gains[3]);
        assert_ne!(gains[3], gains[4], "gain must update on the 4th sample");
        assert_eq!(gains[4], gains[7]);

        // phase carries into the next block
        let mut next = [0.0f32; 2];
        g.process_block(&[0.001, 0.001], &mut next);
        assert_ne!(next[0], gains[7]);
        assert_eq!(next[0], next[1]);
    }
}
