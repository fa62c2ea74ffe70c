//! # Configuration Module
//!
//! Compile-time defaults for the analysis pipeline plus a serializable
//! [`TunerConfig`] that lets a front-end override them from a JSON file.
//!
//! The defaults describe the reference setup: guitar audio decimated to
//! 10 kHz and analysed in 256-sample blocks, which gives a bin width of
//! roughly 39 Hz.

use crate::error::TunerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Sample rate the pipeline analyses at, in Hz.
pub const SAMPLE_RATE: u32 = 10_000;

/// Transform length. Must be a power of two.
pub const FFT_SIZE: usize = 256;

/// Number of PCM samples per analysis block.
pub const SAMPLE_SIZE: usize = FFT_SIZE;

/// Raw blocks whose peak absolute sample is below this are rejected
/// before any transform work is done.
pub const MIN_AMPLITUDE: i16 = 50;

/// Gain applied after DC removal.
///
/// High enough that a sine at `MIN_AMPLITUDE` clears `PEAK_ENERGY_THRESHOLD`
/// after the Hann window. Loud input saturates instead.
pub const DEFAULT_GAIN: f32 = 8.0;

/// Minimum spectral peak magnitude (normalized units) for a valid pitch.
pub const PEAK_ENERGY_THRESHOLD: f32 = 0.5;

/// The peak search never looks above this frequency.
pub const MAX_SEARCH_FREQUENCY_HZ: f32 = 2000.0;

/// Offsets within ±this many cents are reported as in tune.
pub const TUNING_TOLERANCE_CENTS: f32 = 2.0;

/// Runtime configuration for a [`crate::pipeline::Tuner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Sample rate of incoming blocks in Hz
    pub sample_rate: u32,
    /// Transform length (power of two)
    pub fft_size: usize,
    /// Signal-validity gate on raw sample amplitude (int16 units)
    pub min_amplitude: i16,
    /// Saturating gain applied after DC removal
    pub gain: f32,
    /// Minimum magnitude of the spectral peak
    pub peak_energy_threshold: f32,
    /// Upper bound of the peak search in Hz
    pub max_search_hz: f32,
    /// In-tune window in cents
    pub tolerance_cents: f32,
    /// Median filter window applied before windowing; 0 or 1 disables it
    pub median_window: usize,
    /// Refine the peak bin with parabolic interpolation
    pub interpolate_peak: bool,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            fft_size: FFT_SIZE,
            min_amplitude: MIN_AMPLITUDE,
            gain: DEFAULT_GAIN,
            peak_energy_threshold: PEAK_ENERGY_THRESHOLD,
            max_search_hz: MAX_SEARCH_FREQUENCY_HZ,
            tolerance_cents: TUNING_TOLERANCE_CENTS,
            median_window: 0,
            interpolate_peak: false,
        }
    }
}

impl TunerConfig {
    /// Checks the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), TunerError> {
        if self.fft_size == 0 || !self.fft_size.is_power_of_two() {
            return Err(TunerError::InvalidFftSize(self.fft_size));
        }
        if self.sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(self.sample_rate));
        }
        if self.min_amplitude < 0 {
            return Err(TunerError::InvalidParameter {
                name: "min_amplitude",
                value: self.min_amplitude as f32,
            });
        }
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(TunerError::InvalidParameter { name: "gain", value: self.gain });
        }
        if !self.tolerance_cents.is_finite() || self.tolerance_cents < 0.0 {
            return Err(TunerError::InvalidParameter {
                name: "tolerance_cents",
                value: self.tolerance_cents,
            });
        }
        if !self.peak_energy_threshold.is_finite() || self.peak_energy_threshold < 0.0 {
            return Err(TunerError::InvalidParameter {
                name: "peak_energy_threshold",
                value: self.peak_energy_threshold,
            });
        }
        if !self.max_search_hz.is_finite() || self.max_search_hz <= 0.0 {
            return Err(TunerError::InvalidParameter {
                name: "max_search_hz",
                value: self.max_search_hz,
            });
        }
        Ok(())
    }

    /// Width of one spectral bin in Hz.
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Duration of one full analysis block in milliseconds.
    pub fn block_duration_ms(&self) -> f32 {
        self.fft_size as f32 * 1000.0 / self.sample_rate as f32
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Fields missing from the file keep their defaults. If the file cannot
    /// be read or parsed, a warning is logged and the defaults are returned.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[CONFIG] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[CONFIG] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[CONFIG] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}
