//! Butterworth prototypes mapped to the z-plane with the bilinear transform.
//!
//! Frequencies are normalized to Nyquist (`1.0 == fs / 2`). Low-pass and
//! high-pass filters are scaled to unity gain at DC and Nyquist respectively;
//! band-pass filters to unity at the geometric centre of the band.

use alloc::vec::Vec;
use core::f64::consts::PI;

use rustfft::num_complex::Complex64;

/// Band edges of one filter, normalized to Nyquist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandEdges {
    LowPass(f64),
    BandPass(f64, f64),
    HighPass(f64),
}

/// A digital filter as zeros, poles and an overall gain.
#[derive(Debug, Clone, PartialEq)]
pub struct Zpk {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
    pub gain: f64,
}

impl Zpk {
    fn unity() -> Self {
        Zpk {
            zeros: Vec::new(),
            poles: Vec::new(),
            gain: 1.0,
        }
    }

    /// Evaluate `H(z)` at a point on (or off) the unit circle.
    pub fn eval(&self, z: Complex64) -> Complex64 {
        let num: Complex64 = self.zeros.iter().map(|&q| z - q).product();
        let den: Complex64 = self.poles.iter().map(|&p| z - p).product();
        self.gain * num / den
    }
}

/// Analog prototype poles of an order-`order` Butterworth filter.
///
/// Only the upper member of each conjugate pair is returned, followed by the
/// real pole at `-1` when the order is odd.
pub fn prototype_poles(order: usize) -> Vec<Complex64> {
    let mut poles = Vec::with_capacity(order.div_ceil(2));
    let mut j = 0;
    while j + 1 < order {
        let angle = (j + 1) as f64 * PI / (2 * order) as f64;
        poles.push(Complex64::new(-angle.sin(), angle.cos()));
        j += 2;
    }
    if order % 2 == 1 {
        poles.push(Complex64::new(-1.0, 0.0));
    }
    poles
}

fn bilinear(s: Complex64) -> Complex64 {
    (1.0 + s) / (1.0 - s)
}

fn prewarp(wn: f64) -> f64 {
    (PI * wn / 2.0).tan()
}

/// Design a digital Butterworth filter.
///
/// Band-pass designs have twice `order` poles.
pub fn butterworth(order: usize, edges: BandEdges) -> Zpk {
    let mut zpk = Zpk::unity();
    for ap in prototype_poles(order) {
        match edges {
            BandEdges::LowPass(wn) => edge_section(ap, wn, false, &mut zpk),
            BandEdges::HighPass(wn) => edge_section(ap, wn, true, &mut zpk),
            BandEdges::BandPass(lo, hi) => band_section(ap, lo, hi, &mut zpk),
        }
    }
    zpk
}

fn edge_section(ap: Complex64, wn: f64, highpass: bool, out: &mut Zpk) {
    let p = bilinear(ap * prewarp(wn));
    // zeros sit at the opposite end of the band from the reference point
    let reference = if highpass { -1.0 } else { 1.0 };
    let zero = Complex64::new(-reference, 0.0);
    if ap.im == 0.0 {
        out.zeros.push(zero);
        out.poles.push(Complex64::new(p.re, 0.0));
        out.gain *= (reference - p.re).abs() / 2.0;
    } else {
        out.zeros.extend([zero, zero]);
        out.poles.extend([p, p.conj()]);
        out.gain *= ((reference - p.re).powi(2) + p.im * p.im) / 4.0;
    }
}

fn band_section(ap: Complex64, lo: f64, hi: f64, out: &mut Zpk) {
    let u0 = prewarp(lo);
    let u1 = prewarp(hi);
    let wc = (u0 * u1).sqrt();
    let q = wc / (u1 - u0);

    let m1 = ap / q / 2.0;
    let m2 = (m1 * m1 - 1.0).sqrt();
    let a = (m1 + m2) * wc;
    let b = (m1 - m2) * wc;

    let first_zero = out.zeros.len();
    let first_pole = out.poles.len();
    let one = Complex64::new(1.0, 0.0);
    if ap.im == 0.0 {
        out.zeros.extend([one, -one]);
        let pa = bilinear(a);
        if a.im != 0.0 {
            out.poles.extend([pa, pa.conj()]);
        } else {
            out.poles.extend([pa, bilinear(b)]);
        }
    } else {
        let pa = bilinear(a);
        let pb = bilinear(b);
        out.zeros.extend([one, -one, one, -one]);
        out.poles.extend([pa, pa.conj(), pb, pb.conj()]);
    }

    let centre = Complex64::from_polar(1.0, PI * (lo * hi).sqrt());
    let num: Complex64 = out.zeros[first_zero..].iter().map(|&z| centre - z).product();
    let den: Complex64 = out.poles[first_pole..].iter().map(|&p| centre - p).product();
    out.gain *= den.norm() / num.norm();
}

/// Expand roots into real polynomial coefficients, highest power first.
///
/// Complex roots must come in conjugate pairs; imaginary residue is dropped.
pub fn poly(roots: &[Complex64]) -> Vec<f64> {
    let mut c = Vec::with_capacity(roots.len() + 1);
    c.push(Complex64::new(1.0, 0.0));
    for &r in roots {
        c.push(Complex64::new(0.0, 0.0));
        for k in (1..c.len()).rev() {
            let prev = c[k - 1];
            c[k] -= r * prev;
        }
    }
    c.into_iter().map(|v| v.re).collect()
}
