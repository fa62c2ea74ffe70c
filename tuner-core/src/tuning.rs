//! # Tuning Evaluation Module
//!
//! Compares a detected frequency with a target string and turns the
//! difference into a [`TuningResult`].
//!
//! ## Features
//! - Cent offset calculation (`1200 * log2(detected / target)`)
//! - Direction classification with a configurable in-tune window
//! - Auto mode (nearest string is the target) and targeted mode
//! - An explicit `Unknown` direction when no valid pitch was detected

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TuningResult;
use crate::config::{TUNING_TOLERANCE_CENTS, TunerConfig};
use crate::notes::{self, find_closest_note, find_closest_string};
use crate::selection::TargetSelection;

/// Which way the player has to turn the tuning peg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Too flat: tighten the string
    Up,
    /// Too sharp: loosen the string
    Down,
    InTune,
    /// No valid pitch was detected
    Unknown,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::InTune => "IN_TUNE",
            Direction::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// - 100 cents = 1 semitone
/// - Positive values are sharp, negative values are flat
///
/// Returns `0.0` when either frequency is not strictly positive.
pub fn calculate_cents_offset(detected_freq: f32, target_freq: f32) -> f32 {
    if detected_freq <= 0.0 || target_freq <= 0.0 {
        return 0.0;
    }
    1200.0 * (detected_freq / target_freq).log2()
}

/// Classifies a cent offset.
///
/// `Up` below `-tolerance`, `Down` above `+tolerance`, `InTune` otherwise.
/// An offset of exactly ±tolerance counts as in tune.
pub fn get_tuning_direction(cents: f32, tolerance: f32) -> Direction {
    if cents < -tolerance {
        Direction::Up
    } else if cents > tolerance {
        Direction::Down
    } else {
        Direction::InTune
    }
}

fn is_valid_frequency(frequency: f32) -> bool {
    frequency.is_finite() && frequency > 0.0
}

/// Builds [`TuningResult`]s from detected frequencies.
///
/// Pure: the output depends only on the arguments, the tolerance and the
/// static note tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningEvaluator {
    tolerance_cents: f32,
}

impl Default for TuningEvaluator {
    fn default() -> Self {
        Self::new(TUNING_TOLERANCE_CENTS)
    }
}

impl TuningEvaluator {
    pub fn new(tolerance_cents: f32) -> Self {
        Self { tolerance_cents }
    }

    pub fn from_config(config: &TunerConfig) -> Self {
        Self::new(config.tolerance_cents)
    }

    pub fn tolerance_cents(&self) -> f32 {
        self.tolerance_cents
    }

    pub fn direction(&self, cents: f32) -> Direction {
        get_tuning_direction(cents, self.tolerance_cents)
    }

    /// Evaluates against the open string nearest to `detected_frequency`.
    ///
    /// In this mode the detected and target strings are always the same.
    pub fn analyze_tuning_auto(&self, detected_frequency: f32) -> TuningResult {
        if !is_valid_frequency(detected_frequency) {
            return TuningResult::unknown(detected_frequency, None);
        }
        let (string, target_frequency) = find_closest_string(detected_frequency);
        self.build(detected_frequency, string, string, target_frequency)
    }

    /// Evaluates against a chosen string (1 = high E ... 6 = low E).
    ///
    /// The detected string is still matched independently and may differ from
    /// the target when the string is far out of tune. A `target_string`
    /// outside `1..=6` falls back to [`Self::analyze_tuning_auto`].
    pub fn analyze_tuning(&self, detected_frequency: f32, target_string: u8) -> TuningResult {
        let Some(target_frequency) = notes::string_frequency(target_string) else {
            log::debug!(
                "[TUNING] Target string {} out of range, using auto-detect",
                target_string
            );
            return self.analyze_tuning_auto(detected_frequency);
        };
        if !is_valid_frequency(detected_frequency) {
            return TuningResult::unknown(detected_frequency, Some((target_string, target_frequency)));
        }
        let (detected_string, _) = find_closest_string(detected_frequency);
        self.build(detected_frequency, detected_string, target_string, target_frequency)
    }

    /// Dispatches on a [`TargetSelection`].
    pub fn evaluate(&self, detected_frequency: f32, selection: TargetSelection) -> TuningResult {
        match selection {
            TargetSelection::Auto => self.analyze_tuning_auto(detected_frequency),
            TargetSelection::String(n) => self.analyze_tuning(detected_frequency, n),
        }
    }

    fn build(
        &self,
        detected_frequency: f32,
        detected_string: u8,
        target_string: u8,
        target_frequency: f32,
    ) -> TuningResult {
        let cents_offset = calculate_cents_offset(detected_frequency, target_frequency);
        let (note_name, octave) = match find_closest_note(detected_frequency) {
            Some((_, note)) => (note.pitch_class.to_string(), note.octave),
            None => ("?".to_string(), 0),
        };
        let result = TuningResult {
            detected_string: Some(detected_string),
            target_string: Some(target_string),
            cents_offset,
            direction: self.direction(cents_offset),
            detected_frequency,
            target_frequency,
            note_name,
            octave,
        };
        log::debug!(
            "[TUNING] {:.2} Hz -> string {} (target {}, {:.2} Hz): {:+.1} cents, {}",
            detected_frequency,
            detected_string,
            target_string,
            target_frequency,
            cents_offset,
            result.direction
        );
        result
    }
}

/// [`TuningEvaluator::analyze_tuning_auto`] with the default tolerance.
pub fn analyze_tuning_auto(detected_frequency: f32) -> TuningResult {
    TuningEvaluator::default().analyze_tuning_auto(detected_frequency)
}

/// [`TuningEvaluator::analyze_tuning`] with the default tolerance.
pub fn analyze_tuning(detected_frequency: f32, target_string: u8) -> TuningResult {
    TuningEvaluator::default().analyze_tuning(detected_frequency, target_string)
}
