//! Block-level DSP helper functions and dB conversions.

use libm::{expf, log10f};

/// ln(10) / 20: converts dB to natural-log amplitude units.
const DB_TO_NEPER: f32 = 0.115_129_254_649_702;

/// Smallest magnitude fed to [`db2`]; keeps silence at a finite -240 dB.
pub const MIN_LEVEL: f32 = 1.0e-12;

/// Amplitude to dB: `20 * log10(x)`, with `x` floored at [`MIN_LEVEL`].
#[inline(always)]
pub fn db2(x: f32) -> f32 {
    20.0 * log10f(x.max(MIN_LEVEL))
}

/// dB to amplitude: `10^(db / 20)`.
#[inline(always)]
pub fn undb2(db: f32) -> f32 {
    expf(DB_TO_NEPER * db)
}

/// Multiply every sample in `block` by `gain`.
pub fn block_scale(block: &mut [f32], gain: f32) {
    for sample in block.iter_mut() {
        *sample *= gain;
    }
}

/// Multiply `block` sample-by-sample by `gains` (the shorter length wins).
pub fn block_multiply(block: &mut [f32], gains: &[f32]) {
    for (sample, &g) in block.iter_mut().zip(gains.iter()) {
        *sample *= g;
    }
}

/// Add `src * gain` into `dst` sample-by-sample.
pub fn block_accumulate(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d += s * gain;
    }
}

/// Dot product of two equally long slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `dst[i] += scale * src[i]`.
#[inline]
pub fn scale_add(dst: &mut [f32], src: &[f32], scale: f32) {
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d += scale * s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_round_trip_points() {
        assert!((db2(1.0)).abs() < 1e-6);
        assert!((db2(0.1) + 20.0).abs() < 1e-4);
        assert!((undb2(20.0) - 10.0).abs() < 1e-4);
        assert!((undb2(-6.0206) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_db2_silence_is_finite() {
        let db = db2(0.0);
        assert!(db.is_finite());
        assert!((db + 240.0).abs() < 1e-3, "got {}", db);
    }

    #[test]
    fn test_block_scale_and_multiply() {
        let mut block = [1.0f32, -2.0, 4.0];
        block_scale(&mut block, 0.5);
        assert_eq!(block, [0.5, -1.0, 2.0]);
        block_multiply(&mut block, &[2.0, 0.0, -1.0]);
        assert_eq!(block, [1.0, -0.0, -2.0]);
    }

    #[test]
    fn test_block_accumulate() {
        let mut dst = [1.0f32, 1.0];
        block_accumulate(&mut dst, &[2.0, -4.0], 0.5);
        assert_eq!(dst, [2.0, -1.0]);
    }

    #[test]
    fn test_dot_and_scale_add() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        let mut d = [0.0f32; 3];
        scale_add(&mut d, &[1.0, 2.0, 3.0], 2.0);
        assert_eq!(d, [2.0, 4.0, 6.0]);
    }
}
