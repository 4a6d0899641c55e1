//! Design a Butterworth filterbank and print its coefficients.
//!
//! Output is TOML: one `[[band]]` table per band with its second-order
//! sections and alignment delay, followed by the summed response at a few
//! frequencies so the flatness can be checked at a glance.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use hearing_audio::design::{log_spaced_crossovers, DesignConfig, FilterbankDesigner};

#[derive(Parser)]
#[command(name = "design_filterbank")]
#[command(version, about = "Design an IIR filterbank with aligned, equalized bands", long_about = None)]
struct Args {
    /// Number of bands (log-spaced crossovers); ignored with --crossovers
    #[arg(short = 'n', long, default_value = "8")]
    channels: usize,

    /// Explicit crossover frequencies in Hz, comma separated
    #[arg(long, value_delimiter = ',')]
    crossovers: Option<Vec<f64>>,

    /// Butterworth order of the edge bands
    #[arg(long, default_value = "4")]
    order: usize,

    /// Sample rate in Hz
    #[arg(long, default_value = "24000.0")]
    sample_rate: f64,

    /// Target peak delay in ms
    #[arg(long, default_value = "2.5")]
    max_delay_ms: f64,

    /// Gain-equalization iterations
    #[arg(long, default_value = "8")]
    iterations: usize,

    /// Write the TOML here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct BandOut {
    delay: usize,
    gain: f64,
    b: Vec<f64>,
    a: Vec<f64>,
    sos: Vec<[f64; 6]>,
}

#[derive(Serialize)]
struct ResponsePoint {
    freq_hz: f64,
    magnitude_db: f64,
}

#[derive(Serialize)]
struct DesignOut {
    crossovers_hz: Vec<f64>,
    config: DesignConfig,
    band: Vec<BandOut>,
    response: Vec<ResponsePoint>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = DesignConfig {
        order: args.order,
        sample_rate_hz: args.sample_rate,
        max_delay_ms: args.max_delay_ms,
        iterations: args.iterations,
        ..DesignConfig::default()
    };
    let crossovers = args
        .crossovers
        .unwrap_or_else(|| log_spaced_crossovers(args.channels));

    let designer = FilterbankDesigner::new(config)?;
    let bank = designer.design(&crossovers)?;
    tracing::info!(
        bands = bank.len(),
        target_delay = designer.target_delay(),
        "filterbank designed"
    );

    let nyquist = args.sample_rate / 2.0;
    let response = (0..24)
        .map(|i| 100.0 * (0.9 * nyquist / 100.0).powf(i as f64 / 23.0))
        .map(|freq_hz| ResponsePoint {
            freq_hz,
            magnitude_db: 20.0 * bank.combined_response(freq_hz).norm().log10(),
        })
        .collect::<Vec<_>>();
    let worst = response
        .iter()
        .map(|p| p.magnitude_db.abs())
        .fold(0.0f64, f64::max);
    tracing::info!(ripple_db = worst, "summed response");

    let out = DesignOut {
        crossovers_hz: crossovers,
        config,
        band: bank
            .bands()
            .iter()
            .map(|band| BandOut {
                delay: band.delay(),
                gain: band.gain(),
                b: band.b().to_vec(),
                a: band.a().to_vec(),
                sos: band.sos().to_vec(),
            })
            .collect(),
        response,
    };
    let text = toml::to_string(&out).context("serializing design")?;
    match args.output {
        Some(path) => std::fs::write(&path, text)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}
