//! # Target Selection Module
//!
//! Translates what the player picked on the hardware into a tuning target.
//!
//! Two input styles exist:
//! - A string selector reporting `0` (auto-detect) or `1..=6`
//! - Seven natural-note buttons (A to G); the octave is taken from the
//!   detected frequency and the target is computed from A4 = 440 Hz
//!
//! Polling the buttons themselves is the platform layer's job.

use serde::{Deserialize, Serialize};

use crate::notes::{A4_FREQUENCY, PitchClass, STRING_COUNT};

/// Button targets are only offered for detected pitches inside this range (Hz).
pub const BUTTON_RANGE_HZ: (f32, f32) = (82.0, 1312.0);

/// Which string the evaluator should compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetSelection {
    /// Compare against whichever open string is nearest
    #[default]
    Auto,
    /// Compare against a fixed string (1 = high E, 6 = low E)
    String(u8),
}

impl TargetSelection {
    /// Interprets a raw selector code. Anything outside `1..=6` means auto.
    pub fn from_code(code: i32) -> Self {
        match u8::try_from(code) {
            Ok(n) if (1..=STRING_COUNT).contains(&n) => TargetSelection::String(n),
            _ => TargetSelection::Auto,
        }
    }

    /// The raw selector code (`0` for auto).
    pub fn code(self) -> u8 {
        match self {
            TargetSelection::Auto => 0,
            TargetSelection::String(n) => n,
        }
    }
}

/// The seven natural-note buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteButton {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl NoteButton {
    pub fn pitch_class(self) -> PitchClass {
        match self {
            NoteButton::A => PitchClass::A,
            NoteButton::B => PitchClass::B,
            NoteButton::C => PitchClass::C,
            NoteButton::D => PitchClass::D,
            NoteButton::E => PitchClass::E,
            NoteButton::F => PitchClass::F,
            NoteButton::G => PitchClass::G,
        }
    }

    /// Semitones from A within a scientific (C-based) octave; C is -9.
    fn semitones_from_a(self) -> i32 {
        self.pitch_class() as i32 - PitchClass::A as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            NoteButton::A => "A",
            NoteButton::B => "B",
            NoteButton::C => "C",
            NoteButton::D => "D",
            NoteButton::E => "E",
            NoteButton::F => "F",
            NoteButton::G => "G",
        }
    }

    /// Parses a button label, case-insensitively.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(NoteButton::A),
            'B' => Some(NoteButton::B),
            'C' => Some(NoteButton::C),
            'D' => Some(NoteButton::D),
            'E' => Some(NoteButton::E),
            'F' => Some(NoteButton::F),
            'G' => Some(NoteButton::G),
            _ => None,
        }
    }
}

/// Frequency of a natural note in a scientific octave, from A4 = 440 Hz.
///
/// `note_frequency(NoteButton::E, 2)` is the low E string (82.41 Hz).
pub fn note_frequency(button: NoteButton, octave: i32) -> f32 {
    let semitones = 12 * (octave - 4) + button.semitones_from_a();
    A4_FREQUENCY * 2.0_f32.powf(semitones as f32 / 12.0)
}

/// Target frequency for a button press while `detected_freq` is sounding.
///
/// Picks the instance of the pressed note closest to the detected pitch on
/// a log scale, so a slightly flat or sharp string still targets its own
/// octave.
///
/// # Returns
/// * `None` if the detected frequency is outside [`BUTTON_RANGE_HZ`]
pub fn button_to_frequency(button: NoteButton, detected_freq: f32) -> Option<f32> {
    let (low, high) = BUTTON_RANGE_HZ;
    if !(low..high).contains(&detected_freq) {
        return None;
    }
    let detected_semitones = 12.0 * (detected_freq / A4_FREQUENCY).log2();
    let offset = button.semitones_from_a() as f32;
    let octaves_from_a4 = ((detected_semitones - offset) / 12.0).round();
    let semitones = offset + 12.0 * octaves_from_a4;
    Some(A4_FREQUENCY * 2.0_f32.powf(semitones / 12.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_codes_outside_range_mean_auto() {
        assert_eq!(TargetSelection::from_code(0), TargetSelection::Auto);
        assert_eq!(TargetSelection::from_code(3), TargetSelection::String(3));
        assert_eq!(TargetSelection::from_code(6), TargetSelection::String(6));
        assert_eq!(TargetSelection::from_code(7), TargetSelection::Auto);
        assert_eq!(TargetSelection::from_code(-1), TargetSelection::Auto);
        assert_eq!(TargetSelection::String(4).code(), 4);
        assert_eq!(TargetSelection::Auto.code(), 0);
    }

    #[test]
    fn a_button_near_a4_targets_440() {
        let target = button_to_frequency(NoteButton::A, 441.5).unwrap();
        assert!((target - 440.0).abs() < 1e-3);
    }

    #[test]
    fn button_targets_nearest_octave_of_pressed_note() {
        let target = |button, freq| button_to_frequency(button, freq).unwrap();
        assert!((target(NoteButton::E, 83.0) - 82.41).abs() < 0.01);
        assert!((target(NoteButton::E, 160.0) - 164.81).abs() < 0.01);
        assert!((target(NoteButton::C, 250.0) - 261.63).abs() < 0.01);
        assert!((target(NoteButton::G, 100.0) - 98.00).abs() < 0.01);
    }

    #[test]
    fn button_range_is_enforced() {
        assert_eq!(button_to_frequency(NoteButton::A, 81.9), None);
        assert_eq!(button_to_frequency(NoteButton::A, 1312.0), None);
        assert!(button_to_frequency(NoteButton::A, 1311.0).is_some());
    }

    #[test]
    fn same_note_one_octave_apart_doubles() {
        for button in [
            NoteButton::A,
            NoteButton::B,
            NoteButton::C,
            NoteButton::D,
            NoteButton::E,
            NoteButton::F,
            NoteButton::G,
        ] {
            for octave in 2..5 {
                let ratio = note_frequency(button, octave + 1) / note_frequency(button, octave);
                assert!((ratio - 2.0).abs() < 0.01, "{} octave {octave}", button.name());
            }
        }
    }

    #[test]
    fn button_targets_match_known_pitches() {
        assert!((note_frequency(NoteButton::E, 2) - 82.41).abs() < 0.01);
        assert!((note_frequency(NoteButton::C, 4) - 261.63).abs() < 0.01);
        assert!((note_frequency(NoteButton::D, 3) - 146.83).abs() < 0.01);
        assert_eq!(NoteButton::from_letter('g'), Some(NoteButton::G));
        assert_eq!(NoteButton::from_letter('h'), None);
    }
}
