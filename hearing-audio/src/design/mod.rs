//! Offline synthesis of IIR filterbanks.
//!
//! [`FilterbankDesigner`] splits the spectrum at a list of crossover
//! frequencies into one low-pass band, band-pass bands between adjacent
//! crossovers, and one high-pass band. Each band is a Butterworth filter. The
//! designer then
//!
//! 1. flips the sign of bands whose impulse response is mostly negative,
//! 2. delays every band so its impulse-response peak lands on a common
//!    target sample, and
//! 3. iteratively rescales the band gains until the delayed sum is close to
//!    unity magnitude around every crossover.
//!
//! The resulting [`BandFilter`]s are loaded into runtime
//! [`AudioFilterBiquad`](crate::nodes::AudioFilterBiquad) nodes whose outputs
//! are mixed back together.
//!
//! # Example
//! ```ignore
//! let designer = FilterbankDesigner::new(DesignConfig::default())?;
//! let bank = designer.design_log_spaced(8)?;
//! for band in bank.bands() {
//!     let node = AudioFilterBiquad::from_band(band)?;
//!     // add node to the graph, connect input and mixer
//! }
//! ```

pub mod butterworth;

use alloc::vec::Vec;
use core::f64::consts::PI;

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use thiserror::Error;

use crate::constants::{MAX_BAND_DELAY, MAX_FILTERBANK_CHANNELS, MAX_FILTER_ORDER};
use butterworth::{butterworth, poly, BandEdges, Zpk};

/// Lowest crossover of [`log_spaced_crossovers`].
pub const LOG_SPACED_LOW_HZ: f64 = 317.1666;
/// Highest crossover of [`log_spaced_crossovers`].
pub const LOG_SPACED_HIGH_HZ: f64 = 5044.7;

/// Errors returned by [`FilterbankDesigner`]. No partial design is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DesignError {
    #[error("filter order {0} is outside 1..={max}", max = MAX_FILTER_ORDER)]
    Order(usize),

    #[error("band-pass bands need a filter order of at least 2, got {0}")]
    BandPassOrder(usize),

    #[error("{requested} channels requested, supported range is 2..={max}")]
    ChannelCount { requested: usize, max: usize },

    #[error("crossover {index} at {freq_hz} Hz is not strictly increasing inside (0, Nyquist)")]
    Crossover { index: usize, freq_hz: f64 },

    /// Adjacent band edges cross once the spreading factor is applied.
    #[error("crossovers {index} and {} are too close together", .index + 1)]
    CrossoverSpacing { index: usize },

    #[error("sample rate {0} Hz is not a positive finite number")]
    SampleRate(f64),

    #[error("maximum delay {0} ms is negative, non-finite, or longer than the band delay line")]
    MaxDelay(f64),

    #[error("analysis window of {len} samples is shorter than the {needed} needed")]
    AnalysisWindow { len: usize, needed: usize },

    #[error("at least 2 equalization points per crossover are needed, got {0}")]
    EqualizationPoints(usize),

    #[error("could not reserve memory for {0}")]
    OutOfMemory(&'static str),
}

/// Designer parameters.
///
/// `analysis_len`, `iterations` and `points_per_crossover` control the gain
/// equalization; the defaults reach about ±1.5 dB ripple for the classic
/// 8-band, order-4 bank at 24 kHz.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct DesignConfig {
    /// Butterworth order of the low-pass and high-pass bands. Band-pass
    /// bands use half this order per edge.
    pub order: usize,
    pub sample_rate_hz: f64,
    /// Target position of every band's impulse-response peak, in ms.
    pub max_delay_ms: f64,
    /// Impulse-response length (and FFT size) used for equalization.
    pub analysis_len: usize,
    pub iterations: usize,
    /// Log-spaced frequencies per crossover interval checked for flatness.
    pub points_per_crossover: usize,
    /// Spreading applied to each band edge: edges move `spread / cf` apart.
    pub crossover_spread_hz: f64,
}

impl Default for DesignConfig {
    fn default() -> Self {
        DesignConfig {
            order: 4,
            sample_rate_hz: 24_000.0,
            max_delay_ms: 2.5,
            analysis_len: 2048,
            iterations: 8,
            points_per_crossover: 5,
            crossover_spread_hz: 9.0,
        }
    }
}

/// Crossover frequencies for `n_chan` bands, log-spaced between
/// [`LOG_SPACED_LOW_HZ`] and [`LOG_SPACED_HIGH_HZ`].
pub fn log_spaced_crossovers(n_chan: usize) -> Vec<f64> {
    match n_chan {
        0 | 1 => Vec::new(),
        2 => alloc::vec![(LOG_SPACED_LOW_HZ * LOG_SPACED_HIGH_HZ).sqrt()],
        _ => {
            let steps = (n_chan - 2) as f64;
            let ratio = LOG_SPACED_HIGH_HZ / LOG_SPACED_LOW_HZ;
            (0..n_chan - 1)
                .map(|i| LOG_SPACED_LOW_HZ * ratio.powf(i as f64 / steps))
                .collect()
        }
    }
}

/// One designed band: zeros, poles, gain and alignment delay.
#[derive(Debug, Clone, PartialEq)]
pub struct BandFilter {
    edges: BandEdges,
    zpk: Zpk,
    unit_b: Vec<f64>,
    b: Vec<f64>,
    a: Vec<f64>,
    unit_sos: Vec<[f64; 6]>,
    sos: Vec<[f64; 6]>,
    delay: usize,
}

impl BandFilter {
    fn new(edges: BandEdges, mut zpk: Zpk, order: usize) -> Self {
        let origin = Complex64::new(0.0, 0.0);
        zpk.zeros.resize(order.max(zpk.zeros.len()), origin);
        zpk.poles.resize(order.max(zpk.poles.len()), origin);
        let unit_b = poly(&zpk.zeros);
        let a = poly(&zpk.poles);
        let unit_sos = second_order_sections(&zpk.zeros, &zpk.poles);
        let mut band = BandFilter {
            edges,
            b: unit_b.clone(),
            sos: unit_sos.clone(),
            zpk,
            unit_b,
            a,
            unit_sos,
            delay: 0,
        };
        band.apply_gain();
        band
    }

    fn set_gain(&mut self, gain: f64) {
        self.zpk.gain = gain;
        self.apply_gain();
    }

    fn apply_gain(&mut self) {
        let g = self.zpk.gain;
        for (dst, src) in self.b.iter_mut().zip(&self.unit_b) {
            *dst = src * g;
        }
        self.sos.clone_from(&self.unit_sos);
        if let Some(first) = self.sos.first_mut() {
            for c in &mut first[..3] {
                *c *= g;
            }
        }
    }

    /// Normalized band edges (fractions of Nyquist) after spreading.
    pub fn edges(&self) -> BandEdges {
        self.edges
    }

    pub fn zeros(&self) -> &[Complex64] {
        &self.zpk.zeros
    }

    pub fn poles(&self) -> &[Complex64] {
        &self.zpk.poles
    }

    /// Overall gain, including any sign flip and equalization.
    pub fn gain(&self) -> f64 {
        self.zpk.gain
    }

    /// Numerator coefficients with the gain folded in.
    pub fn b(&self) -> &[f64] {
        &self.b
    }

    /// Denominator coefficients (`a[0] == 1`).
    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Second-order sections `[b0, b1, b2, a0, a1, a2]`; the gain is
    /// carried by the first section.
    pub fn sos(&self) -> &[[f64; 6]] {
        &self.sos
    }

    /// Alignment delay in samples.
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Complex response at `freq_hz`, without the alignment delay.
    pub fn response(&self, freq_hz: f64, sample_rate_hz: f64) -> Complex64 {
        self.zpk
            .eval(Complex64::from_polar(1.0, 2.0 * PI * freq_hz / sample_rate_hz))
    }

    /// First `len` samples of the impulse response, without the delay.
    pub fn impulse_response(&self, len: usize) -> Vec<f64> {
        let mut out = alloc::vec![0.0; len];
        self.impulse_into(&mut out);
        out
    }

    fn impulse_into(&self, out: &mut [f64]) {
        out.fill(0.0);
        if let Some(first) = out.first_mut() {
            *first = 1.0;
        }
        for s in &self.sos {
            let (mut z1, mut z2) = (0.0, 0.0);
            for x in out.iter_mut() {
                let y = s[0] * *x + z1;
                z1 = s[1] * *x - s[4] * y + z2;
                z2 = s[2] * *x - s[5] * y;
                *x = y;
            }
        }
    }
}

/// Pair roots in order into sections. Pairs that are all padding at the
/// origin are dropped.
fn second_order_sections(zeros: &[Complex64], poles: &[Complex64]) -> Vec<[f64; 6]> {
    const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

    fn quadratic(roots: &[Complex64]) -> [f64; 3] {
        match roots {
            [r] => [1.0, -r.re, 0.0],
            [r0, r1] => [1.0, -(r0 + r1).re, (r0 * r1).re],
            _ => [1.0, 0.0, 0.0],
        }
    }

    let mut sections: Vec<[f64; 6]> = zeros
        .chunks(2)
        .zip(poles.chunks(2))
        .map(|(z, p)| {
            let [b0, b1, b2] = quadratic(z);
            let [a0, a1, a2] = quadratic(p);
            [b0, b1, b2, a0, a1, a2]
        })
        .filter(|s| *s != IDENTITY)
        .collect();
    if sections.is_empty() {
        sections.push(IDENTITY);
    }
    sections
}

/// A complete filterbank, lowest band first.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterbankDesign {
    bands: Vec<BandFilter>,
    sample_rate_hz: f64,
}

impl FilterbankDesign {
    pub fn bands(&self) -> &[BandFilter] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Per-band alignment delays in samples.
    pub fn delays(&self) -> Vec<usize> {
        self.bands.iter().map(BandFilter::delay).collect()
    }

    /// Response of the delayed sum of all bands at `freq_hz`.
    pub fn combined_response(&self, freq_hz: f64) -> Complex64 {
        let w = 2.0 * PI * freq_hz / self.sample_rate_hz;
        self.bands
            .iter()
            .map(|b| {
                b.response(freq_hz, self.sample_rate_hz)
                    * Complex64::from_polar(1.0, -w * b.delay as f64)
            })
            .sum()
    }
}

/// Validated designer. Cheap to keep around and reuse.
#[derive(Debug, Clone)]
pub struct FilterbankDesigner {
    config: DesignConfig,
    target_delay: usize,
}

impl FilterbankDesigner {
    pub fn new(config: DesignConfig) -> Result<Self, DesignError> {
        if config.order == 0 || config.order > MAX_FILTER_ORDER {
            return Err(DesignError::Order(config.order));
        }
        let fs = config.sample_rate_hz;
        if !(fs.is_finite() && fs > 0.0) {
            return Err(DesignError::SampleRate(fs));
        }
        let td = config.max_delay_ms;
        if !(td.is_finite() && td >= 0.0) {
            return Err(DesignError::MaxDelay(td));
        }
        let target_delay = (td * fs / 1000.0).round() as usize;
        if target_delay >= MAX_BAND_DELAY {
            return Err(DesignError::MaxDelay(td));
        }
        if config.analysis_len <= target_delay {
            return Err(DesignError::AnalysisWindow {
                len: config.analysis_len,
                needed: target_delay + 1,
            });
        }
        if config.points_per_crossover < 2 {
            return Err(DesignError::EqualizationPoints(config.points_per_crossover));
        }
        Ok(FilterbankDesigner {
            config,
            target_delay,
        })
    }

    pub fn config(&self) -> &DesignConfig {
        &self.config
    }

    /// Peak position every band is aligned to, in samples.
    pub fn target_delay(&self) -> usize {
        self.target_delay
    }

    /// Design with [`log_spaced_crossovers`].
    pub fn design_log_spaced(&self, n_chan: usize) -> Result<FilterbankDesign, DesignError> {
        if !(2..=MAX_FILTERBANK_CHANNELS).contains(&n_chan) {
            return Err(DesignError::ChannelCount {
                requested: n_chan,
                max: MAX_FILTERBANK_CHANNELS,
            });
        }
        self.design(&log_spaced_crossovers(n_chan))
    }

    /// Design one band per interval between `crossovers_hz` (so
    /// `crossovers_hz.len() + 1` bands).
    pub fn design(&self, crossovers_hz: &[f64]) -> Result<FilterbankDesign, DesignError> {
        let n_bands = crossovers_hz.len() + 1;
        if !(2..=MAX_FILTERBANK_CHANNELS).contains(&n_bands) {
            return Err(DesignError::ChannelCount {
                requested: n_bands,
                max: MAX_FILTERBANK_CHANNELS,
            });
        }
        let order = self.config.order;
        if n_bands > 2 && order < 2 {
            return Err(DesignError::BandPassOrder(order));
        }
        let edges = self.band_edges(crossovers_hz)?;

        let mut bands = Vec::new();
        bands
            .try_reserve_exact(n_bands)
            .map_err(|_| DesignError::OutOfMemory("filterbank bands"))?;
        for e in edges {
            let zpk = match e {
                BandEdges::BandPass(..) => butterworth(order / 2, e),
                _ => butterworth(order, e),
            };
            bands.push(BandFilter::new(e, zpk, order));
        }

        self.align_peaks(&mut bands)?;
        self.equalize(&mut bands, crossovers_hz)?;

        #[cfg(feature = "tracing")]
        for (index, band) in bands.iter().enumerate() {
            tracing::debug!(index, gain = band.gain(), delay = band.delay(), "filterbank band");
        }

        Ok(FilterbankDesign {
            bands,
            sample_rate_hz: self.config.sample_rate_hz,
        })
    }

    fn band_edges(&self, crossovers_hz: &[f64]) -> Result<Vec<BandEdges>, DesignError> {
        let nyquist = self.config.sample_rate_hz / 2.0;
        let mut prev = 0.0;
        for (index, &freq_hz) in crossovers_hz.iter().enumerate() {
            if !(freq_hz.is_finite() && freq_hz > prev && freq_hz < nyquist) {
                return Err(DesignError::Crossover { index, freq_hz });
            }
            prev = freq_hz;
        }

        let spread = |cf: f64| 1.0 + self.config.crossover_spread_hz / cf;
        // (below, above) each crossover, normalized to Nyquist
        let split: Vec<(f64, f64)> = crossovers_hz
            .iter()
            .map(|&cf| (cf / spread(cf) / nyquist, cf * spread(cf) / nyquist))
            .collect();

        let last = split.len() - 1;
        let mut edges = Vec::with_capacity(split.len() + 1);
        edges.push(BandEdges::LowPass(split[0].0));
        for j in 1..split.len() {
            let lo = split[j - 1].1;
            let hi = split[j].0;
            if !(lo < hi) {
                return Err(DesignError::CrossoverSpacing { index: j - 1 });
            }
            edges.push(BandEdges::BandPass(lo, hi));
        }
        if !(split[last].0 > 0.0 && split[last].1 < 1.0) {
            return Err(DesignError::Crossover {
                index: last,
                freq_hz: crossovers_hz[last],
            });
        }
        edges.push(BandEdges::HighPass(split[last].1));
        Ok(edges)
    }

    /// Flip predominantly negative bands, then delay each band so its first
    /// impulse-response maximum falls on the target sample.
    fn align_peaks(&self, bands: &mut [BandFilter]) -> Result<(), DesignError> {
        let window = self.target_delay + 1;
        let mut y = Vec::new();
        y.try_reserve_exact(window)
            .map_err(|_| DesignError::OutOfMemory("peak alignment window"))?;
        y.resize(window, 0.0);

        for band in bands.iter_mut() {
            band.impulse_into(&mut y);
            let lowest = y.iter().copied().fold(0.0f64, f64::min);
            let highest = y.iter().copied().fold(0.0f64, f64::max);
            if -lowest > highest {
                band.set_gain(-band.gain());
                y.iter_mut().for_each(|v| *v = -*v);
            }
            let mut peak = 0;
            for (i, &v) in y.iter().enumerate().skip(1) {
                if v > y[peak] {
                    peak = i;
                }
            }
            band.delay = self.target_delay.saturating_sub(peak);
        }
        Ok(())
    }

    /// FFT bins around crossover `j`: log-spaced from `cf[j + 1]` down to `cf[j]`.
    fn crossover_bins(&self, crossovers_hz: &[f64], j: usize) -> impl Iterator<Item = usize> + '_ {
        let nf = self.config.points_per_crossover;
        let nt = self.config.analysis_len as f64;
        let fs = self.config.sample_rate_hz;
        let (lo, hi) = (crossovers_hz[j], crossovers_hz[j + 1]);
        (0..nf).map(move |k| {
            let e = k as f64 / (nf - 1) as f64;
            let f = lo.powf(e) * hi.powf(1.0 - e);
            (f * nt / fs).round() as usize
        })
    }

    /// Iteratively rescale the band-pass gains until the delayed sum has
    /// unity geometric-mean magnitude across each band.
    fn equalize(&self, bands: &mut [BandFilter], crossovers_hz: &[f64]) -> Result<(), DesignError> {
        let n_bands = bands.len();
        if n_bands < 3 {
            return Ok(());
        }
        let nt = self.config.analysis_len;
        let nf = self.config.points_per_crossover;
        let n_bins = (n_bands - 2) * nf;

        let mut bins = Vec::new();
        bins.try_reserve_exact(n_bins)
            .map_err(|_| DesignError::OutOfMemory("equalization bins"))?;
        for j in 0..n_bands - 2 {
            bins.extend(self.crossover_bins(crossovers_hz, j));
        }

        // spectra[band * n_bins + k]: delayed response of `band` at bins[k]
        let mut spectra = Vec::new();
        spectra
            .try_reserve_exact(n_bands * n_bins)
            .map_err(|_| DesignError::OutOfMemory("band spectra"))?;
        let mut impulse = Vec::new();
        impulse
            .try_reserve_exact(nt)
            .map_err(|_| DesignError::OutOfMemory("analysis impulse response"))?;
        impulse.resize(nt, 0.0);
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(nt)
            .map_err(|_| DesignError::OutOfMemory("analysis spectrum"))?;
        buffer.resize(nt, Complex64::new(0.0, 0.0));

        let fft = FftPlanner::<f64>::new().plan_fft_forward(nt);
        for band in bands.iter() {
            band.impulse_into(&mut impulse);
            let d = band.delay.min(nt);
            buffer[..d].fill(Complex64::new(0.0, 0.0));
            for (dst, &src) in buffer[d..].iter_mut().zip(&impulse) {
                *dst = Complex64::new(src, 0.0);
            }
            fft.process(&mut buffer);
            spectra.extend(bins.iter().map(|&m| buffer[m % nt]));
        }

        let mut gains = alloc::vec![1.0f64; n_bands];
        let mut total = alloc::vec![Complex64::new(0.0, 0.0); n_bins];
        for _ in 0..self.config.iterations {
            for (k, t) in total.iter_mut().enumerate() {
                *t = (0..n_bands).map(|b| gains[b] * spectra[b * n_bins + k]).sum();
            }
            for j in 0..n_bands - 2 {
                let mean_log = total[j * nf..(j + 1) * nf]
                    .iter()
                    .map(|h| h.norm().ln())
                    .sum::<f64>()
                    / nf as f64;
                gains[j + 1] /= mean_log.exp();
            }
        }

        for (band, g) in bands.iter_mut().zip(&gains) {
            band.set_gain(band.gain() * g);
        }
        Ok(())
    }
}
