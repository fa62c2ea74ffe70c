//! # Audio Capture Module
//!
//! Turns a stream of device samples into the fixed-size 16-bit blocks the
//! pipeline analyses.
//!
//! ## Features
//! - [`BlockAssembler`]: integer decimation, `f32` to `i16` conversion and
//!   block framing, independent of any audio backend
//! - `start_audio_capture` (feature `capture`): default input device via
//!   CPAL, streaming blocks over a crossbeam channel
//!
//! Microphones rarely offer the low analysis rate directly, so the device
//! rate is divided down by the largest integer factor that does not drop
//! below the target rate.

#[cfg(feature = "capture")]
use anyhow::{Result, anyhow};
#[cfg(feature = "capture")]
use cpal::SupportedStreamConfigRange;
#[cfg(feature = "capture")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
#[cfg(feature = "capture")]
use crossbeam_channel::Sender;

/// Integer decimation factor that keeps the output rate at or above `target_rate`.
pub fn decimation_for(device_rate: u32, target_rate: u32) -> usize {
    if target_rate == 0 || device_rate <= target_rate {
        return 1;
    }
    (device_rate / target_rate).max(1) as usize
}

/// Converts a float sample in `[-1, 1]` to 16-bit PCM, saturating outside that range.
pub fn f32_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let scaled = (sample * 32768.0).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Frames device samples into fixed-size PCM blocks.
#[derive(Debug, Clone)]
pub struct BlockAssembler {
    block_size: usize,
    decimation: usize,
    device_rate: u32,
    acc: f32,
    acc_count: usize,
    block: Vec<i16>,
}

impl BlockAssembler {
    /// # Arguments
    /// * `block_size` - Samples per emitted block (at least 1)
    /// * `device_rate` - Rate of the samples passed to [`Self::push`]
    /// * `target_rate` - Desired analysis rate
    pub fn new(block_size: usize, device_rate: u32, target_rate: u32) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            decimation: decimation_for(device_rate, target_rate),
            device_rate,
            acc: 0.0,
            acc_count: 0,
            block: Vec::with_capacity(block_size),
        }
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Sample rate of the emitted blocks.
    pub fn effective_rate(&self) -> u32 {
        self.device_rate / self.decimation as u32
    }

    /// Feeds device samples and calls `emit` for every completed block.
    ///
    /// Each group of `decimation` input samples is box-averaged into one
    /// output sample. Partial groups and blocks carry over to the next call.
    pub fn push<F: FnMut(Vec<i16>)>(&mut self, samples: &[f32], mut emit: F) {
        for &sample in samples {
            self.acc += sample;
            self.acc_count += 1;
            if self.acc_count < self.decimation {
                continue;
            }
            let averaged = self.acc / self.decimation as f32;
            self.acc = 0.0;
            self.acc_count = 0;

            self.block.push(f32_to_i16(averaged));
            if self.block.len() == self.block_size {
                let full = std::mem::replace(&mut self.block, Vec::with_capacity(self.block_size));
                emit(full);
            }
        }
    }
}

/// Starts audio capture from the default input device.
///
/// Blocks of `block_size` samples at the effective rate are sent over
/// `sender`; blocks are dropped if the channel is full.
///
/// # Returns
/// * `Ok((stream, effective_rate))` - The running stream (dropping it stops capture)
/// * `Err(e)` - No usable input device or format
#[cfg(feature = "capture")]
pub fn start_audio_capture(
    sender: Sender<Vec<i16>>,
    block_size: usize,
    target_rate: u32,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("[CAPTURE] Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config =
        find_supported_config(configs, target_rate).ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let device_rate = supported_config
        .max_sample_rate()
        .0
        .min(supported_config.min_sample_rate().0.max(target_rate));
    let config = supported_config.with_sample_rate(cpal::SampleRate(device_rate));
    let channels = config.channels().max(1) as usize;
    let config: cpal::StreamConfig = config.into();

    let mut assembler = BlockAssembler::new(block_size, device_rate, target_rate);
    let effective_rate = assembler.effective_rate();
    log::info!(
        "[CAPTURE] Device rate {} Hz, {} channel(s), decimation {} -> {} Hz",
        device_rate,
        channels,
        assembler.decimation(),
        effective_rate
    );

    let err_fn = |err| log::error!("[CAPTURE] Audio stream error: {}", err);
    let mut mono = Vec::new();

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Only the first channel is analysed
            mono.clear();
            mono.extend(data.iter().step_by(channels));
            assembler.push(&mono, |block| {
                let _ = sender.try_send(block);
            });
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, effective_rate))
}

/// Picks an f32 input configuration, preferring mono and then the range
/// closest to `target_rate`.
#[cfg(feature = "capture")]
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_diff = if in_range { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, rate_diff)
        })
}
