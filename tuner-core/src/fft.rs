//! # Fast Fourier Transform (FFT) Module
//!
//! Turns one block of 16-bit PCM into a magnitude half-spectrum.
//!
//! ## Processing steps
//! 1. DC offset removal (integer mean)
//! 2. Saturating gain
//! 3. Normalization to [-1, 1]
//! 4. Optional median noise filter
//! 5. Hann windowing, zero padding up to the transform size
//! 6. Forward transform through a [`SpectralEngine`]
//! 7. Magnitudes of the first `N / 2` bins
//!
//! Two engines share the same contract: [`RustFftEngine`] (RustFFT planner)
//! for production use and [`Radix2Fft`], a plain decimation-in-time
//! transform that serves as the reference implementation.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::error::TunerError;
use crate::noise;

/// Full-scale value used to map `i16` samples into [-1, 1].
const PCM_FULL_SCALE: f32 = 32768.0;

/// Returns the largest absolute sample value in the block.
pub fn max_abs_amplitude(samples: &[i16]) -> i32 {
    samples
        .iter()
        .map(|&s| (s as i32).abs())
        .max()
        .unwrap_or(0)
}

/// Removes the DC offset from a block by subtracting its integer mean.
///
/// The subtraction saturates at the `i16` limits instead of wrapping.
pub fn remove_dc_offset(samples: &mut [i16]) {
    if samples.is_empty() {
        return;
    }
    let sum: i64 = samples.iter().map(|&s| s as i64).sum();
    let offset = sum / samples.len() as i64;
    if offset == 0 {
        return;
    }
    for sample in samples.iter_mut() {
        let shifted = *sample as i64 - offset;
        *sample = shifted.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
    }
}

/// Multiplies every sample by `gain`, clamping to +32767 / -32768.
pub fn apply_gain(samples: &mut [i16], gain: f32) {
    for sample in samples.iter_mut() {
        let amplified = *sample as f32 * gain;
        *sample = amplified.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
}

/// Converts a PCM sample to a float in [-1, 1].
#[inline]
pub fn normalize_sample(sample: i16) -> f32 {
    sample as f32 / PCM_FULL_SCALE
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
///
/// Uses the symmetric form `0.5 * (1 - cos(2πi / (N - 1)))`. Buffers shorter
/// than two samples are left untouched.
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Writes `sqrt(re² + im²)` for each of the first `out.len()` bins.
pub fn magnitudes_into(real: &[f32], imag: &[f32], out: &mut [f32]) {
    for ((mag, &re), &im) in out.iter_mut().zip(real).zip(imag) {
        *mag = (re * re + im * im).sqrt();
    }
}

fn check_size(size: usize) -> Result<(), TunerError> {
    if size == 0 || !size.is_power_of_two() {
        return Err(TunerError::InvalidFftSize(size));
    }
    Ok(())
}

/// A forward complex transform of a fixed power-of-two length.
///
/// Implementations transform `real`/`imag` in place. Both slices must have
/// exactly [`SpectralEngine::size`] elements.
pub trait SpectralEngine: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Transform length.
    fn size(&self) -> usize;

    /// Runs the forward transform in place.
    fn process(&mut self, real: &mut [f32], imag: &mut [f32]);
}

/// Iterative radix-2 decimation-in-time FFT.
///
/// Twiddle factors `W = e^{-j2πk/N}` are computed once at construction.
#[derive(Debug, Clone)]
pub struct Radix2Fft {
    size: usize,
    levels: u32,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
}

impl Radix2Fft {
    /// Creates a transform of length `size`.
    ///
    /// # Errors
    /// * `TunerError::InvalidFftSize` if `size` is zero or not a power of two
    pub fn new(size: usize) -> Result<Self, TunerError> {
        check_size(size)?;
        let half = size / 2;
        let (cos_table, sin_table): (Vec<f32>, Vec<f32>) = (0..half)
            .map(|k| {
                let angle = 2.0 * PI * k as f32 / size as f32;
                (angle.cos(), angle.sin())
            })
            .unzip();
        Ok(Self {
            size,
            levels: size.trailing_zeros(),
            cos_table,
            sin_table,
        })
    }

    fn reverse_bits(&self, index: usize) -> usize {
        if self.levels == 0 {
            0
        } else {
            index.reverse_bits() >> (usize::BITS - self.levels)
        }
    }
}

impl SpectralEngine for Radix2Fft {
    fn name(&self) -> &'static str {
        "radix2"
    }

    fn size(&self) -> usize {
        self.size
    }

    fn process(&mut self, real: &mut [f32], imag: &mut [f32]) {
        let n = self.size;
        assert_eq!(real.len(), n, "real buffer length must equal the FFT size");
        assert_eq!(imag.len(), n, "imaginary buffer length must equal the FFT size");

        // Bit-reversal permutation
        for i in 0..n {
            let j = self.reverse_bits(i);
            if j > i {
                real.swap(i, j);
                imag.swap(i, j);
            }
        }

        // log2(N) butterfly stages
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let step = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let w_re = self.cos_table[k * step];
                    let w_im = -self.sin_table[k * step];
                    let top = start + k;
                    let bottom = top + half;

                    let t_re = real[bottom] * w_re - imag[bottom] * w_im;
                    let t_im = real[bottom] * w_im + imag[bottom] * w_re;

                    real[bottom] = real[top] - t_re;
                    imag[bottom] = imag[top] - t_im;
                    real[top] += t_re;
                    imag[top] += t_im;
                }
            }
            len *= 2;
        }
    }
}

/// Forward transform backed by RustFFT.
pub struct RustFftEngine {
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl RustFftEngine {
    /// Plans a forward transform of length `size`.
    ///
    /// RustFFT handles any length, but the pipeline's bin arithmetic assumes
    /// a power of two, so other sizes are rejected here as well.
    pub fn new(size: usize) -> Result<Self, TunerError> {
        check_size(size)?;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Ok(Self {
            fft,
            scratch: vec![Complex { re: 0.0, im: 0.0 }; size],
        })
    }
}

impl SpectralEngine for RustFftEngine {
    fn name(&self) -> &'static str {
        "rustfft"
    }

    fn size(&self) -> usize {
        self.scratch.len()
    }

    fn process(&mut self, real: &mut [f32], imag: &mut [f32]) {
        assert_eq!(real.len(), self.scratch.len(), "real buffer length must equal the FFT size");
        assert_eq!(imag.len(), self.scratch.len(), "imaginary buffer length must equal the FFT size");

        for ((c, &re), &im) in self.scratch.iter_mut().zip(real.iter()).zip(imag.iter()) {
            *c = Complex { re, im };
        }
        self.fft.process(&mut self.scratch);
        for ((c, re), im) in self.scratch.iter().zip(real.iter_mut()).zip(imag.iter_mut()) {
            *re = c.re;
            *im = c.im;
        }
    }
}

/// Real/imaginary work buffers and the derived magnitude half-spectrum.
///
/// Storage is allocated once and overwritten on every analysis cycle.
#[derive(Debug, Clone)]
pub struct SpectrumBuffer {
    pub real: Vec<f32>,
    pub imag: Vec<f32>,
    pub magnitude: Vec<f32>,
}

impl SpectrumBuffer {
    pub fn new(fft_size: usize) -> Self {
        Self {
            real: vec![0.0; fft_size],
            imag: vec![0.0; fft_size],
            magnitude: vec![0.0; fft_size / 2],
        }
    }

    /// Number of retained (non-redundant) bins.
    pub fn num_bins(&self) -> usize {
        self.magnitude.len()
    }
}

/// Runs the preprocessing chain and a [`SpectralEngine`] over PCM blocks.
pub struct SpectrumAnalyzer {
    engine: Box<dyn SpectralEngine>,
    buffer: SpectrumBuffer,
    gain: f32,
    median_window: usize,
    pcm: Vec<i16>,
}

impl SpectrumAnalyzer {
    pub fn new(engine: Box<dyn SpectralEngine>, gain: f32) -> Self {
        let size = engine.size();
        Self {
            engine,
            buffer: SpectrumBuffer::new(size),
            gain,
            median_window: 0,
            pcm: Vec::with_capacity(size),
        }
    }

    /// Enables the median noise filter; `0` or `1` disables it.
    pub fn with_median_window(mut self, window: usize) -> Self {
        self.median_window = window;
        self
    }

    pub fn fft_size(&self) -> usize {
        self.engine.size()
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Buffers from the most recent [`Self::transform`] call.
    pub fn spectrum(&self) -> &SpectrumBuffer {
        &self.buffer
    }

    /// Transforms one block and returns its magnitude half-spectrum.
    ///
    /// Blocks shorter than the transform size are zero-padded; longer
    /// blocks are preprocessed as a whole and the first `fft_size` samples
    /// are transformed.
    ///
    /// # Errors
    /// * `TunerError::EmptyBlock` if `samples` is empty
    pub fn transform(&mut self, samples: &[i16]) -> Result<&[f32], TunerError> {
        if samples.is_empty() {
            return Err(TunerError::EmptyBlock);
        }
        let n = self.engine.size();

        self.pcm.clear();
        self.pcm.extend_from_slice(samples);
        remove_dc_offset(&mut self.pcm);
        apply_gain(&mut self.pcm, self.gain);

        let used = self.pcm.len().min(n);
        let real = &mut self.buffer.real;
        for (dst, &sample) in real.iter_mut().zip(&self.pcm[..used]) {
            *dst = normalize_sample(sample);
        }
        if self.median_window > 1 {
            let filtered = noise::median_filter(&real[..used], self.median_window);
            real[..used].copy_from_slice(&filtered);
        }
        apply_hann_window(&mut real[..used]);
        real[used..].fill(0.0);
        self.buffer.imag.fill(0.0);

        self.engine.process(&mut self.buffer.real, &mut self.buffer.imag);
        magnitudes_into(&self.buffer.real, &self.buffer.imag, &mut self.buffer.magnitude);

        log::trace!(
            "[FFT] {}-point {} transform of {} samples ({} used)",
            n,
            self.engine.name(),
            samples.len(),
            used
        );
        Ok(&self.buffer.magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(real: &[f32], imag: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let n = real.len();
        let mut out_re = vec![0.0f32; n];
        let mut out_im = vec![0.0f32; n];
        for k in 0..n {
            for t in 0..n {
                let angle = -2.0 * PI * (k * t) as f32 / n as f32;
                out_re[k] += real[t] * angle.cos() - imag[t] * angle.sin();
                out_im[k] += real[t] * angle.sin() + imag[t] * angle.cos();
            }
        }
        (out_re, out_im)
    }

    fn test_signal(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let x = i as f32;
                (0.3 * x).sin() + 0.5 * (1.7 * x).cos() - 0.1 * ((i * 7) % 5) as f32
            })
            .collect()
    }

    #[test]
    fn radix2_rejects_non_power_of_two() {
        assert_eq!(Radix2Fft::new(12).unwrap_err(), TunerError::InvalidFftSize(12));
        assert_eq!(Radix2Fft::new(0).unwrap_err(), TunerError::InvalidFftSize(0));
        assert!(RustFftEngine::new(100).is_err());
        assert!(Radix2Fft::new(1).is_ok());
    }

    #[test]
    fn radix2_impulse_gives_flat_spectrum() {
        let mut fft = Radix2Fft::new(16).unwrap();
        let mut real = vec![0.0; 16];
        let mut imag = vec![0.0; 16];
        real[0] = 1.0;
        fft.process(&mut real, &mut imag);
        for k in 0..16 {
            assert!((real[k] - 1.0).abs() < 1e-6, "bin {k}: {}", real[k]);
            assert!(imag[k].abs() < 1e-6);
        }
    }

    #[test]
    fn radix2_matches_naive_dft() {
        let n = 64;
        let input = test_signal(n);
        let (expected_re, expected_im) = naive_dft(&input, &vec![0.0; n]);

        let mut fft = Radix2Fft::new(n).unwrap();
        let mut real = input.clone();
        let mut imag = vec![0.0; n];
        fft.process(&mut real, &mut imag);

        for k in 0..n {
            assert!((real[k] - expected_re[k]).abs() < 1e-3, "re bin {k}");
            assert!((imag[k] - expected_im[k]).abs() < 1e-3, "im bin {k}");
        }
    }

    #[test]
    fn radix2_and_rustfft_agree() {
        let n = 256;
        let input = test_signal(n);

        let mut reference = Radix2Fft::new(n).unwrap();
        let mut production = RustFftEngine::new(n).unwrap();

        let (mut re_a, mut im_a) = (input.clone(), vec![0.0; n]);
        let (mut re_b, mut im_b) = (input, vec![0.0; n]);
        reference.process(&mut re_a, &mut im_a);
        production.process(&mut re_b, &mut im_b);

        for k in 0..n {
            assert!((re_a[k] - re_b[k]).abs() < 1e-2, "re bin {k}");
            assert!((im_a[k] - im_b[k]).abs() < 1e-2, "im bin {k}");
        }
    }

    #[test]
    fn pure_tone_on_bin_center_peaks_at_that_bin() {
        let n = 64;
        let bin = 8;
        let mut real: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / n as f32).sin())
            .collect();
        let mut imag = vec![0.0; n];
        Radix2Fft::new(n).unwrap().process(&mut real, &mut imag);

        let mut mags = vec![0.0; n / 2];
        magnitudes_into(&real, &imag, &mut mags);
        assert!((mags[bin] - n as f32 / 2.0).abs() < 1e-3);
        assert!(mags[bin - 1] < 1e-3 && mags[bin + 1] < 1e-3);
    }

    #[test]
    fn dc_offset_uses_integer_mean() {
        let mut samples = [100i16, 102, 104];
        remove_dc_offset(&mut samples);
        assert_eq!(samples, [-2, 0, 2]);
    }

    #[test]
    fn dc_offset_saturates_instead_of_wrapping() {
        let mut samples = [32767i16, 32767, -32768];
        remove_dc_offset(&mut samples);
        // mean is 10922
        assert_eq!(samples, [21845, 21845, i16::MIN]);
    }

    #[test]
    fn gain_saturates_at_i16_limits() {
        let mut samples = [20000i16, -20000, 100, 0];
        apply_gain(&mut samples, 2.0);
        assert_eq!(samples, [32767, -32768, 200, 0]);
    }

    #[test]
    fn hann_window_tapers_edges() {
        let mut window = vec![1.0f32; 9];
        apply_hann_window(&mut window);
        assert!(window[0].abs() < 1e-6);
        assert!(window[8].abs() < 1e-6);
        assert!((window[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn analyzer_zero_pads_short_blocks() {
        let engine = Box::new(Radix2Fft::new(256).unwrap());
        let mut analyzer = SpectrumAnalyzer::new(engine, 1.0);
        let block: Vec<i16> = (0..100).map(|i| ((i % 10) as i16 - 5) * 1000).collect();

        let mags = analyzer.transform(&block).unwrap();
        assert_eq!(mags.len(), 128);
        assert!(mags.iter().all(|&m| m >= 0.0 && m.is_finite()));
        assert!(analyzer.spectrum().real.len() == 256);
    }

    #[test]
    fn analyzer_rejects_empty_block() {
        let engine = Box::new(RustFftEngine::new(64).unwrap());
        let mut analyzer = SpectrumAnalyzer::new(engine, 2.0);
        assert_eq!(analyzer.transform(&[]).unwrap_err(), TunerError::EmptyBlock);
    }

    #[test]
    fn constant_block_has_no_energy_after_dc_removal() {
        let engine = Box::new(RustFftEngine::new(64).unwrap());
        let mut analyzer = SpectrumAnalyzer::new(engine, 2.0);
        let mags = analyzer.transform(&[5000i16; 64]).unwrap();
        assert!(mags.iter().all(|&m| m < 1e-6));
    }
}
