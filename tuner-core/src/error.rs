//! Error types for the tuner core.
//!
//! Only configuration misuse is reported through [`TunerError`]. A weak
//! signal, an out-of-range string selection or a zero frequency are normal
//! operating conditions and are expressed as sentinel values instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TunerError {
    #[error("FFT size must be a non-zero power of two (got {0})")]
    InvalidFftSize(usize),
    #[error("sample rate must be at least 1 Hz (got {0})")]
    InvalidSampleRate(u32),
    #[error("invalid value for `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    #[error("audio block is empty")]
    EmptyBlock,
}
