//! # Pitch Detection Module
//!
//! Finds the fundamental of a plucked string as the dominant peak of a
//! magnitude half-spectrum.
//!
//! ## Features
//! - Raw-amplitude gate that rejects silence before any transform work
//! - DC-excluding peak search capped at a maximum frequency
//! - Minimum-energy gate on the winning bin
//! - Optional log-parabolic interpolation for sub-bin accuracy

use crate::config::{MAX_SEARCH_FREQUENCY_HZ, PEAK_ENERGY_THRESHOLD, TunerConfig};
use crate::fft::max_abs_amplitude;

/// Converts a (possibly fractional) bin index to Hz.
pub fn bin_to_frequency(bin: f32, sample_rate: u32, fft_size: usize) -> f32 {
    bin * sample_rate as f32 / fft_size as f32
}

/// Returns `true` if the block's loudest raw sample reaches `min_amplitude`.
pub fn passes_amplitude_gate(samples: &[i16], min_amplitude: i16) -> bool {
    max_abs_amplitude(samples) >= min_amplitude as i32
}

/// Dominant-peak search over a magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakFinder {
    /// Peaks weaker than this are treated as "no signal"
    pub energy_threshold: f32,
    /// Bins above this frequency are never considered
    pub max_search_hz: f32,
    /// Refine the winning bin with parabolic interpolation
    pub interpolate: bool,
}

impl Default for PeakFinder {
    fn default() -> Self {
        Self {
            energy_threshold: PEAK_ENERGY_THRESHOLD,
            max_search_hz: MAX_SEARCH_FREQUENCY_HZ,
            interpolate: false,
        }
    }
}

impl PeakFinder {
    pub fn from_config(config: &TunerConfig) -> Self {
        Self {
            energy_threshold: config.peak_energy_threshold,
            max_search_hz: config.max_search_hz,
            interpolate: config.interpolate_peak,
        }
    }

    /// Exclusive upper bound of the searched bins.
    ///
    /// The bound is `fft_size * max_search_hz / sample_rate`, clamped to the
    /// number of bins actually present.
    fn search_limit(&self, available_bins: usize, fft_size: usize, sample_rate: u32) -> usize {
        let limit = (fft_size as f32 * self.max_search_hz / sample_rate as f32) as usize;
        limit.min(available_bins)
    }

    /// Returns the index and magnitude of the dominant bin.
    ///
    /// Bin 0 (DC) is never returned. Among equal magnitudes the lowest bin
    /// wins. The energy gate is not applied here.
    pub fn peak_bin(&self, magnitude: &[f32], fft_size: usize, sample_rate: u32) -> Option<(usize, f32)> {
        let limit = self.search_limit(magnitude.len(), fft_size, sample_rate);
        let mut best: Option<(usize, f32)> = None;
        for (bin, &mag) in magnitude.iter().enumerate().take(limit).skip(1) {
            let is_better = match best {
                Some((_, best_mag)) => mag > best_mag,
                None => mag > 0.0,
            };
            if is_better {
                best = Some((bin, mag));
            }
        }
        best
    }

    /// Estimates the dominant frequency in Hz.
    ///
    /// # Arguments
    /// * `magnitude` - Magnitude half-spectrum (`fft_size / 2` bins)
    /// * `fft_size` - Length of the transform that produced it
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * The peak frequency, or `0.0` if no bin clears the energy gate
    pub fn find_peak(&self, magnitude: &[f32], fft_size: usize, sample_rate: u32) -> f32 {
        let Some((bin, mag)) = self.peak_bin(magnitude, fft_size, sample_rate) else {
            log::trace!("[PITCH] Empty search range, no peak");
            return 0.0;
        };
        if mag < self.energy_threshold {
            log::trace!(
                "[PITCH] Peak at bin {} too weak ({:.3} < {:.3})",
                bin,
                mag,
                self.energy_threshold
            );
            return 0.0;
        }

        let frequency = if self.interpolate {
            refine_peak(magnitude, bin, sample_rate, fft_size)
        } else {
            bin_to_frequency(bin as f32, sample_rate, fft_size)
        };
        log::trace!("[PITCH] Peak at bin {} ({:.3}) -> {:.2} Hz", bin, mag, frequency);
        frequency
    }
}

/// Estimates the dominant frequency with the default gate and search limit.
pub fn find_peak(magnitude: &[f32], fft_size: usize, sample_rate: u32) -> f32 {
    PeakFinder::default().find_peak(magnitude, fft_size, sample_rate)
}

/// Refines a peak bin to a sub-bin frequency estimate.
///
/// Fits a parabola through the log magnitudes of the peak and its two
/// neighbours. Whenever the fit is not usable the plain bin frequency is
/// returned.
pub fn refine_peak(magnitude: &[f32], peak_bin: usize, sample_rate: u32, fft_size: usize) -> f32 {
    let rough_freq = bin_to_frequency(peak_bin as f32, sample_rate, fft_size);
    if peak_bin == 0 || peak_bin + 1 >= magnitude.len() {
        return rough_freq;
    }

    let y1 = magnitude[peak_bin - 1].ln();
    let y2 = magnitude[peak_bin].ln();
    let y3 = magnitude[peak_bin + 1].ln();
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return rough_freq;
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return rough_freq;
    }

    let peak_shift = (y3 - y1) / (2.0 * denominator);
    let final_freq = bin_to_frequency(peak_bin as f32 + peak_shift, sample_rate, fft_size);
    if final_freq.is_finite() && final_freq > 0.0 {
        final_freq
    } else {
        rough_freq
    }
}
