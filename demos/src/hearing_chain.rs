//! Run a simulated hearing-aid chain offline.
//!
//! A test tone plus noise is played into the graph through a play queue, the
//! processed output is read back from a record queue, and a fraction of it is
//! fed back into the next microphone block through a short acoustic path. The
//! chain is
//!
//! ```text
//! mic → feedback cancel → band filters → per-band WDRC → mixer → speaker
//!              ↑____________________ loopback ______________________|
//! ```
//!
//! Without a `[filterbank]` table the chain is a single broadband compressor.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use hearing_audio::constants::MAX_FILTERBANK_CHANNELS;
use hearing_audio::design::{DesignConfig, FilterbankDesigner};
use hearing_audio::prelude::*;

#[derive(Parser)]
#[command(name = "hearing_chain")]
#[command(version, about = "Run a simulated hearing-aid processing chain", long_about = None)]
struct Args {
    /// Preset file (TOML) with [settings], [wdrc], [afc] and [filterbank] tables
    #[arg(short, long)]
    preset: Option<PathBuf>,

    /// Seconds of audio to simulate
    #[arg(long, default_value = "5.0")]
    seconds: f32,

    /// Test tone frequency in Hz
    #[arg(long, default_value = "1000.0")]
    tone_hz: f32,

    /// Test tone level in dB re full scale
    #[arg(long, default_value = "-30.0")]
    tone_db: f32,

    /// Gain of the simulated acoustic feedback path (0 disables it)
    #[arg(long, default_value = "0.2")]
    feedback: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SettingsPreset {
    #[serde(flatten)]
    audio: AudioSettings,
    pool_blocks: usize,
}

impl Default for SettingsPreset {
    fn default() -> Self {
        SettingsPreset {
            audio: AudioSettings::default(),
            pool_blocks: 64,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FilterbankPreset {
    channels: usize,
    #[serde(flatten)]
    design: DesignConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Preset {
    settings: SettingsPreset,
    wdrc: WdrcParams,
    afc: AfcParams,
    filterbank: Option<FilterbankPreset>,
}

/// Echo path, in samples after the one-block loopback latency.
const ECHO_TAPS: [f32; 4] = [0.0, 0.3, 1.0, -0.4];

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let preset: Preset = match &args.preset {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading preset {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing preset {}", path.display()))?
        }
        None => Preset::default(),
    };

    let settings = preset.settings.audio;
    settings.validate()?;
    let pool = BlockPool::new(preset.settings.pool_blocks, settings)?;
    let mut graph = Graph::new(&pool);

    let play = AudioPlayQueue::new();
    let mic_writer = play.writer();
    let mut rec = AudioRecordQueue::new();
    rec.start();
    let speaker = rec.reader();

    let mic = graph.add_node(play);
    let afc = graph.add_node(AudioEffectFeedbackCancel::new(preset.afc));
    let out = graph.add_node(rec);

    let last = match &preset.filterbank {
        Some(fb) => {
            if fb.channels > MAX_FILTERBANK_CHANNELS {
                bail!("at most {} filterbank channels are supported", MAX_FILTERBANK_CHANNELS);
            }
            let bank = FilterbankDesigner::new(fb.design)?.design_log_spaced(fb.channels)?;
            let mix = graph.add_node(AudioMixer::<MAX_FILTERBANK_CHANNELS>::new());
            for (ch, band) in bank.bands().iter().enumerate() {
                let filter = graph.add_node(AudioFilterBiquad::from_band(band)?);
                let comp = graph.add_node(AudioEffectCompWdrc::new(preset.wdrc));
                graph.connect(afc, 0, filter, 0)?;
                graph.connect(filter, 0, comp, 0)?;
                graph.connect(comp, 0, mix, ch)?;
                tracing::info!(ch, delay = band.delay(), gain = band.gain(), "band");
            }
            mix
        }
        None => {
            let comp = graph.add_node(AudioEffectCompWdrc::new(preset.wdrc));
            graph.connect(afc, 0, comp, 0)?;
            comp
        }
    };
    graph.connect(mic, 0, afc, 0)?;
    graph.connect(last, 0, out, 0)?;
    graph.add_loopback(last, 0, afc)?;

    let n = settings.block_samples;
    let fs = settings.sample_rate_hz;
    let ticks = (args.seconds * fs / n as f32).ceil() as usize;
    let ticks_per_report = (fs / n as f32).round().max(1.0) as usize;
    let tone_amp = 10f32.powf(args.tone_db / 20.0);
    let phase_step = std::f32::consts::TAU * args.tone_hz / fs;
    tracing::info!(ticks, block_samples = n, sample_rate_hz = fs, "running chain");

    let mut played: Vec<f32> = Vec::with_capacity(ticks * n);
    let mut seed = 0x1234_5678u32;
    let (mut in_energy, mut out_energy) = (0.0f64, 0.0f64);
    for tick in 0..ticks {
        let mut block = vec![0.0f32; n];
        for (i, s) in block.iter_mut().enumerate() {
            let t = tick * n + i;
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = ((seed >> 8) as f32 / (1u32 << 24) as f32 - 0.5) * 0.01;
            let echo: f32 = ECHO_TAPS
                .iter()
                .enumerate()
                .filter_map(|(j, h)| t.checked_sub(n + j).map(|k| h * played[k]))
                .sum();
            *s = tone_amp * (phase_step * t as f32).sin() + noise + args.feedback * echo;
            in_energy += f64::from(*s * *s);
        }
        if mic_writer.play(BlockBuffer::from_samples(&block, 0)).is_err() {
            tracing::warn!(tick, "play queue full");
        }
        graph.update_all();

        match speaker.read() {
            Some(buf) => {
                out_energy += buf.samples().iter().map(|&x| f64::from(x * x)).sum::<f64>();
                played.extend_from_slice(buf.samples());
            }
            None => played.extend(std::iter::repeat(0.0).take(n)),
        }

        if (tick + 1) % ticks_per_report == 0 {
            let samples = (ticks_per_report * n) as f64;
            let canceller = graph
                .node::<AudioEffectFeedbackCancel>(afc)
                .context("feedback canceller missing")?
                .canceller();
            tracing::info!(
                seconds = (tick + 1) as f32 * n as f32 / fs,
                in_db = 10.0 * (in_energy / samples).max(1e-12).log10(),
                out_db = 10.0 * (out_energy / samples).max(1e-12).log10(),
                afc_power = canceller.power(),
                afc_resets = canceller.reset_count(),
                afc_behind = canceller.falling_behind_count(),
                pool_peak = pool.max_in_use(),
                "report"
            );
            in_energy = 0.0;
            out_energy = 0.0;
        }
    }

    let canceller = graph
        .node::<AudioEffectFeedbackCancel>(afc)
        .context("feedback canceller missing")?
        .canceller();
    let largest = canceller
        .coefficients()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
    if let Some((tap, value)) = largest {
        tracing::info!(tap, value, "largest feedback estimate tap");
    }
    if speaker.overflow_count() > 0 {
        tracing::warn!(dropped = speaker.overflow_count(), "speaker queue overflowed");
    }
    Ok(())
}
