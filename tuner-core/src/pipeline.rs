//! # Analysis Pipeline
//!
//! One analysis cycle per audio block:
//!
//! 1. Raw-amplitude gate
//! 2. Preprocessing and transform ([`SpectrumAnalyzer`])
//! 3. Dominant-peak search ([`PeakFinder`])
//! 4. String matching and cent evaluation ([`TuningEvaluator`])
//!
//! A [`Tuner`] reuses its buffers from cycle to cycle and is meant to be
//! driven by a single thread.

use crate::TuningResult;
use crate::config::TunerConfig;
use crate::error::TunerError;
use crate::fft::{RustFftEngine, SpectralEngine, SpectrumAnalyzer, SpectrumBuffer};
use crate::pitch::{PeakFinder, passes_amplitude_gate};
use crate::selection::TargetSelection;
use crate::tuning::TuningEvaluator;

pub struct Tuner {
    config: TunerConfig,
    analyzer: SpectrumAnalyzer,
    peak_finder: PeakFinder,
    evaluator: TuningEvaluator,
}

impl Tuner {
    /// Creates a tuner backed by the `rustfft` engine.
    ///
    /// # Errors
    /// Returns the first problem found by [`TunerConfig::validate`].
    pub fn new(config: TunerConfig) -> Result<Self, TunerError> {
        config.validate()?;
        let engine = RustFftEngine::new(config.fft_size)?;
        Self::with_engine(config, Box::new(engine))
    }

    /// Creates a tuner around an explicit transform engine.
    ///
    /// # Errors
    /// * The config is invalid
    /// * `TunerError::InvalidFftSize` if the engine size differs from `config.fft_size`
    pub fn with_engine(config: TunerConfig, engine: Box<dyn SpectralEngine>) -> Result<Self, TunerError> {
        config.validate()?;
        if engine.size() != config.fft_size {
            return Err(TunerError::InvalidFftSize(engine.size()));
        }
        log::info!(
            "[PITCH] Tuner ready: {} engine, {} points at {} Hz ({:.1} Hz/bin)",
            engine.name(),
            config.fft_size,
            config.sample_rate,
            config.bin_width_hz()
        );
        let analyzer = SpectrumAnalyzer::new(engine, config.gain).with_median_window(config.median_window);
        Ok(Self {
            peak_finder: PeakFinder::from_config(&config),
            evaluator: TuningEvaluator::from_config(&config),
            analyzer,
            config,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &'static str {
        self.analyzer.engine_name()
    }

    /// Spectrum of the most recent block that passed the amplitude gate.
    pub fn last_spectrum(&self) -> &SpectrumBuffer {
        self.analyzer.spectrum()
    }

    /// Detects the dominant frequency of one block.
    ///
    /// # Returns
    /// * Frequency in Hz, or `0.0` for an empty, quiet or weak block
    pub fn detect_frequency(&mut self, samples: &[i16]) -> f32 {
        if !passes_amplitude_gate(samples, self.config.min_amplitude) {
            log::trace!("[PITCH] Block below amplitude gate ({} samples)", samples.len());
            return 0.0;
        }
        let magnitude = match self.analyzer.transform(samples) {
            Ok(magnitude) => magnitude,
            Err(e) => {
                log::warn!("[PITCH] Transform skipped: {}", e);
                return 0.0;
            }
        };
        self.peak_finder
            .find_peak(magnitude, self.config.fft_size, self.config.sample_rate)
    }

    /// Runs a full analysis cycle and evaluates the result against `selection`.
    pub fn process(&mut self, samples: &[i16], selection: TargetSelection) -> TuningResult {
        let frequency = self.detect_frequency(samples);
        self.evaluator.evaluate(frequency, selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::Radix2Fft;
    use crate::tuning::Direction;

    #[test]
    fn invalid_config_fails_fast() {
        let config = TunerConfig { fft_size: 300, ..TunerConfig::default() };
        assert_eq!(Tuner::new(config).err(), Some(TunerError::InvalidFftSize(300)));
    }

    #[test]
    fn engine_size_must_match_config() {
        let engine = Radix2Fft::new(512).unwrap();
        let result = Tuner::with_engine(TunerConfig::default(), Box::new(engine));
        assert_eq!(result.err(), Some(TunerError::InvalidFftSize(512)));
    }

    #[test]
    fn silence_and_empty_blocks_are_unknown() {
        let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
        assert_eq!(tuner.detect_frequency(&[]), 0.0);
        assert_eq!(tuner.detect_frequency(&[0; 256]), 0.0);
        let result = tuner.process(&[3; 256], TargetSelection::Auto);
        assert_eq!(result.direction, Direction::Unknown);
    }

    #[test]
    fn loud_dc_block_has_no_pitch() {
        let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
        assert_eq!(tuner.detect_frequency(&[4000; 256]), 0.0);
    }

    #[test]
    fn engine_name_reported() {
        let tuner = Tuner::new(TunerConfig::default()).unwrap();
        assert_eq!(tuner.engine_name(), "rustfft");
        let radix2 = Tuner::with_engine(TunerConfig::default(), Box::new(Radix2Fft::new(256).unwrap())).unwrap();
        assert_eq!(radix2.engine_name(), "radix2");
    }
}
