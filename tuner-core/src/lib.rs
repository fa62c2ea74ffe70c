// tuner-core/src/lib.rs

//! The core logic for the accessible guitar tuner.
//! This crate turns blocks of 16-bit audio samples into tuning guidance:
//! spectral analysis, pitch detection, string matching, and the beep and
//! spoken-clip feedback that replaces a visual display. It is completely
//! headless and does no audio output itself.

pub mod audio;
pub mod config;
pub mod error;
pub mod feedback;
pub mod fft;
pub mod noise;
pub mod notes;
pub mod pipeline;
pub mod pitch;
pub mod selection;
pub mod sequencer;
pub mod tuning;

use serde::Serialize;

pub use config::TunerConfig;
pub use error::TunerError;
pub use pipeline::Tuner;
pub use selection::TargetSelection;
pub use tuning::Direction;

/// The outcome of evaluating one detected frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningResult {
    /// Nearest open string (1 = high E, 6 = low E), `None` when nothing was detected.
    pub detected_string: Option<u8>,
    /// String the offset was measured against.
    pub target_string: Option<u8>,
    /// Deviation from the target in cents, positive when sharp.
    pub cents_offset: f32,
    pub direction: Direction,
    pub detected_frequency: f32,
    pub target_frequency: f32,
    /// Pitch class of the nearest chromatic note, "?" when unknown.
    pub note_name: String,
    pub octave: i32,
}

impl TuningResult {
    /// A result for a block with no usable pitch.
    ///
    /// `target` keeps the chosen string in targeted mode.
    pub fn unknown(detected_frequency: f32, target: Option<(u8, f32)>) -> Self {
        let (target_string, target_frequency) = match target {
            Some((string, frequency)) => (Some(string), frequency),
            None => (None, 0.0),
        };
        Self {
            detected_string: None,
            target_string,
            cents_offset: 0.0,
            direction: Direction::Unknown,
            detected_frequency,
            target_frequency,
            note_name: "?".to_string(),
            octave: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.detected_string.is_some() && self.direction != Direction::Unknown
    }
}
