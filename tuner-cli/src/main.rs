//! # Guitar Tuner - Command Line Front End
//!
//! Drives the tuner core from synthetic tones, WAV files or (with the
//! `live` feature) the default microphone, and prints the tuning results
//! together with the feedback the device would give.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use guitar_tuner_core::audio::BlockAssembler;
use guitar_tuner_core::feedback::calculate_beep_interval;
use guitar_tuner_core::fft::{Radix2Fft, RustFftEngine, SpectralEngine};
use guitar_tuner_core::notes::find_note_by_name;
use guitar_tuner_core::selection::{NoteButton, button_to_frequency};
use guitar_tuner_core::sequencer::AudioSequencer;
use guitar_tuner_core::tuning::{TuningEvaluator, calculate_cents_offset};
use guitar_tuner_core::{TargetSelection, Tuner, TunerConfig, TuningResult};
use tracing::{Level, debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "guitar-tuner", about = "Accessible guitar tuner with audio feedback")]
struct Cli {
    /// JSON configuration file (missing fields keep their defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Transform engine
    #[arg(long, value_enum, default_value_t = Engine::Rustfft, global = true)]
    engine: Engine,
    /// Print results as JSON lines
    #[arg(long, global = true)]
    json: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse one synthesised sine block
    Synth {
        #[arg(long, required_unless_present = "note", conflicts_with = "note")]
        freq: Option<f32>,
        /// Chromatic note instead of a frequency, e.g. "A2" or "F#3"
        #[arg(long)]
        note: Option<String>,
        #[arg(long, default_value_t = 10_000.0)]
        amplitude: f32,
        /// String selector: 0 = auto, 1 = high E ... 6 = low E
        #[arg(long, default_value_t = 0)]
        string: i32,
        /// Also measure against a natural-note button (A-G)
        #[arg(long)]
        button: Option<char>,
    },
    /// Analyse every block of a WAV file
    Analyze {
        path: PathBuf,
        #[arg(long, default_value_t = 0)]
        string: i32,
    },
    /// Tune from the default microphone
    #[cfg(feature = "live")]
    Listen {
        #[arg(long, default_value_t = 0)]
        string: i32,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Engine {
    Rustfft,
    Radix2,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => TunerConfig::load_from_file(path),
        None => TunerConfig::default(),
    };

    match cli.command {
        Commands::Synth {
            freq,
            note,
            amplitude,
            string,
            button,
        } => {
            let freq = resolve_frequency(freq, note.as_deref())?;
            let mut tuner = build_tuner(config, cli.engine)?;
            run_synth(&mut tuner, freq, amplitude, string, button, cli.json)
        }
        Commands::Analyze { path, string } => run_analyze(config, cli.engine, &path, string, cli.json),
        #[cfg(feature = "live")]
        Commands::Listen { string, seconds } => live::run_listen(config, cli.engine, string, seconds, cli.json),
    }
}

/// Frequency of a `synth` tone from either `--freq` or `--note`.
fn resolve_frequency(freq: Option<f32>, note: Option<&str>) -> Result<f32> {
    match (freq, note) {
        (Some(freq), _) => Ok(freq),
        (None, Some(name)) => match find_note_by_name(name) {
            Some(entry) => Ok(entry.frequency),
            None => bail!("unknown note '{name}' (expected E2 to C5, e.g. A2 or F#3)"),
        },
        (None, None) => bail!("either --freq or --note is required"),
    }
}

/// Builds a tuner whose analysis rate is `sample_rate` rather than the configured one.
fn tuner_at_rate(config: TunerConfig, engine: Engine, sample_rate: u32) -> Result<Tuner> {
    if sample_rate != config.sample_rate {
        info!(
            "Analysing at {} Hz instead of the configured {} Hz",
            sample_rate, config.sample_rate
        );
    }
    build_tuner(TunerConfig { sample_rate, ..config }, engine)
}

fn build_tuner(config: TunerConfig, engine: Engine) -> Result<Tuner> {
    let spectral: Box<dyn SpectralEngine> = match engine {
        Engine::Rustfft => Box::new(RustFftEngine::new(config.fft_size)?),
        Engine::Radix2 => Box::new(Radix2Fft::new(config.fft_size)?),
    };
    Tuner::with_engine(config, spectral).context("invalid tuner configuration")
}

fn sine_block(frequency: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32;
            (amplitude * phase.sin())
                .round()
                .clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

fn run_synth(
    tuner: &mut Tuner,
    freq: f32,
    amplitude: f32,
    string: i32,
    button: Option<char>,
    json: bool,
) -> Result<()> {
    let config = tuner.config().clone();
    let block = sine_block(freq, amplitude, config.sample_rate, config.fft_size);
    let result = tuner.process(&block, TargetSelection::from_code(string));
    report(&result, json)?;
    announce(&result);

    if let Some(letter) = button {
        let Some(button) = NoteButton::from_letter(letter) else {
            bail!("unknown note button '{letter}' (expected A-G)");
        };
        match button_to_frequency(button, result.detected_frequency) {
            Some(target) => {
                let cents = calculate_cents_offset(result.detected_frequency, target);
                let direction = TuningEvaluator::from_config(&config).direction(cents);
                println!(
                    "Button {}: target {:.2} Hz, {:+.1} cents, {}",
                    button.name(),
                    target,
                    cents,
                    direction
                );
            }
            None => warn!(
                "Detected {:.2} Hz is outside the note button range",
                result.detected_frequency
            ),
        }
    }
    Ok(())
}

/// Reads a WAV file as mono floats in [-1, 1] plus its sample rate.
fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("reading float samples")?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .collect::<Result<Vec<_>, _>>()
                .context("reading integer samples")?
                .into_iter()
                .map(|s| s as f32 / max_val)
                .collect()
        }
    };
    // first channel only
    let mono = samples.into_iter().step_by(channels).collect();
    Ok((mono, spec.sample_rate))
}

/// Frames WAV samples into analysis blocks and builds a tuner at the rate
/// those blocks actually have after decimation.
fn analysis_blocks(
    config: TunerConfig,
    engine: Engine,
    samples: &[f32],
    wav_rate: u32,
) -> Result<(Tuner, Vec<Vec<i16>>)> {
    let mut assembler = BlockAssembler::new(config.fft_size, wav_rate, config.sample_rate);
    debug!(
        "WAV rate {} Hz, decimation {} -> {} Hz",
        wav_rate,
        assembler.decimation(),
        assembler.effective_rate()
    );
    let mut blocks = Vec::new();
    assembler.push(samples, |block| blocks.push(block));
    let tuner = tuner_at_rate(config, engine, assembler.effective_rate())?;
    Ok((tuner, blocks))
}

fn run_analyze(config: TunerConfig, engine: Engine, path: &Path, string: i32, json: bool) -> Result<()> {
    let (samples, wav_rate) = read_wav(path)?;
    info!(
        "Analysing {} ({} samples at {} Hz)",
        path.display(),
        samples.len(),
        wav_rate
    );

    let (mut tuner, blocks) = analysis_blocks(config, engine, &samples, wav_rate)?;
    if blocks.is_empty() {
        bail!("{} is shorter than one analysis block", path.display());
    }

    let selection = TargetSelection::from_code(string);
    let block_ms = tuner.config().block_duration_ms();
    for (index, block) in blocks.iter().enumerate() {
        let result = tuner.process(block, selection);
        if json {
            report(&result, true)?;
        } else {
            print!("{:8.1} ms  ", index as f32 * block_ms);
            report(&result, false)?;
        }
    }
    Ok(())
}

fn report(result: &TuningResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
        return Ok(());
    }
    if !result.is_valid() {
        println!("No pitch detected");
        return Ok(());
    }
    println!(
        "{:7.2} Hz  {}{}  string {} (target {} @ {:.2} Hz)  {:+7.1} cents  {:<7}  beep every {} ms",
        result.detected_frequency,
        result.note_name,
        result.octave,
        result.detected_string.unwrap_or(0),
        result.target_string.unwrap_or(0),
        result.target_frequency,
        result.cents_offset,
        result.direction,
        calculate_beep_interval(result.cents_offset)
    );
    Ok(())
}

/// Logs the clip sequence the spoken-feedback mode would play.
fn announce(result: &TuningResult) {
    let mut sequencer = AudioSequencer::new();
    sequencer.start(result);
    while sequencer.is_playing() {
        if let Some(clip) = sequencer.update() {
            debug!("Clip {:?} -> {}", clip, clip.file_name().unwrap_or("-"));
        }
    }
}

#[cfg(feature = "live")]
mod live {
    use std::time::{Duration, Instant};

    use anyhow::Result;
    use cpal::traits::StreamTrait;
    use crossbeam_channel::{after, bounded, never, select, tick};
    use guitar_tuner_core::audio;
    use guitar_tuner_core::feedback::BeepScheduler;
    use guitar_tuner_core::{TargetSelection, TunerConfig};
    use tracing::{info, warn};

    use super::Engine;

    /// Beep scheduler polling period.
    const BEEP_POLL: Duration = Duration::from_millis(20);

    pub fn run_listen(
        config: TunerConfig,
        engine: Engine,
        string: i32,
        seconds: Option<u64>,
        json: bool,
    ) -> Result<()> {
        let (block_tx, block_rx) = bounded::<Vec<i16>>(8);
        let (stream, rate) = audio::start_audio_capture(block_tx, config.fft_size, config.sample_rate)?;
        let mut tuner = super::tuner_at_rate(config, engine, rate)?;

        let selection = TargetSelection::from_code(string);
        let mut beeps = BeepScheduler::new();
        let start = Instant::now();
        let ticker = tick(BEEP_POLL);
        let deadline = match seconds {
            Some(s) => after(Duration::from_secs(s)),
            None => never(),
        };
        info!("Listening, press Ctrl-C to stop");

        loop {
            select! {
                recv(block_rx) -> msg => match msg {
                    Ok(block) => {
                        let result = tuner.process(&block, selection);
                        beeps.set_result(&result);
                        if result.is_valid() {
                            super::report(&result, json)?;
                        }
                    }
                    Err(_) => {
                        warn!("Audio channel closed");
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    let now_ms = start.elapsed().as_millis() as u64;
                    if let Some(event) = beeps.update(now_ms) {
                        println!("BEEP ({} ms, every {} ms)", event.duration_ms, event.interval_ms);
                    }
                },
                recv(deadline) -> _ => break,
            }
        }

        if let Err(e) = stream.pause() {
            warn!("Error pausing stream: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn tone(frequency: f32, amplitude: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * frequency * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn wav_at_device_rate_is_analysed_at_decimated_rate() {
        let config = TunerConfig::default();
        let samples = tone(344.53, 0.3, 44_100, config.fft_size * 4);
        for engine in [Engine::Rustfft, Engine::Radix2] {
            let (mut tuner, blocks) = analysis_blocks(config.clone(), engine, &samples, 44_100).unwrap();
            assert_eq!(tuner.config().sample_rate, 11_025);
            assert_eq!(blocks.len(), 1);
            let result = tuner.process(&blocks[0], TargetSelection::Auto);
            assert!(
                (result.detected_frequency - 344.53).abs() < 0.01,
                "{engine:?}: detected {}",
                result.detected_frequency
            );
            assert_eq!(result.detected_string, Some(1));
        }
    }

    #[test]
    fn wav_at_analysis_rate_keeps_configured_rate() {
        let config = TunerConfig::default();
        let samples = tone(312.5, 0.3, config.sample_rate, config.fft_size);
        let (mut tuner, blocks) = analysis_blocks(config.clone(), Engine::Rustfft, &samples, config.sample_rate).unwrap();
        assert_eq!(tuner.config().sample_rate, config.sample_rate);
        assert_eq!(tuner.detect_frequency(&blocks[0]), 312.5);
    }

    #[test]
    fn synth_note_resolves_to_table_frequency() {
        assert_eq!(resolve_frequency(None, Some("A4")).unwrap(), 440.0);
        assert_eq!(resolve_frequency(None, Some("E2")).unwrap(), 82.41);
        assert_eq!(resolve_frequency(Some(196.0), None).unwrap(), 196.0);
        assert!(resolve_frequency(None, Some("H2")).is_err());
        assert!(resolve_frequency(None, Some("A7")).is_err());
        assert!(resolve_frequency(None, None).is_err());
    }

    #[test]
    fn synth_takes_either_freq_or_note() {
        let cli = Cli::try_parse_from(["guitar-tuner", "synth", "--note", "G3"]).unwrap();
        match cli.command {
            Commands::Synth { freq, note, .. } => {
                assert_eq!(freq, None);
                assert_eq!(note.as_deref(), Some("G3"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["guitar-tuner", "synth"]).is_err());
        assert!(Cli::try_parse_from(["guitar-tuner", "synth", "--freq", "196", "--note", "G3"]).is_err());
    }
}
