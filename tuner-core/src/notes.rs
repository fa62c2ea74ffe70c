//! # Note and String Tables
//!
//! Read-only lookup tables for standard guitar tuning and the nearest-match
//! searches that run over them.
//!
//! ## Tables
//! - Six open-string reference frequencies, string 1 (high E4) to string 6
//!   (low E2)
//! - The chromatic range E2 to C5 (33 notes), each tagged with the string it
//!   is normally played on
//!
//! Both lookups are linear scans by absolute frequency difference. They always
//! return the nearest entry, however far away it is.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of strings on a standard guitar.
pub const STRING_COUNT: u8 = 6;

/// Open-string frequencies in Hz, indexed by `string_number - 1`.
pub const STRING_FREQUENCIES: [f32; STRING_COUNT as usize] =
    [329.63, 246.94, 196.00, 146.83, 110.00, 82.41];

const STRING_NAMES: [&str; STRING_COUNT as usize] = ["E4", "B3", "G3", "D3", "A2", "E2"];

/// Concert pitch reference.
pub const A4_FREQUENCY: f32 = 440.0;
const A4_MIDI: i32 = 69;

/// MIDI numbers of the first (E2) and last (C5) entries of the chromatic table.
const LOWEST_NOTE_MIDI: i32 = 40;
const HIGHEST_NOTE_MIDI: i32 = 72;

/// The twelve pitch classes, starting at C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class of a semitone index counted from C (wraps in both directions).
    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the chromatic note table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteEntry {
    /// Frequency in Hz (rounded to 0.01 Hz)
    pub frequency: f32,
    pub pitch_class: PitchClass,
    /// String this note is primarily played on (1-6)
    pub string_number: u8,
    pub octave: i32,
}

impl NoteEntry {
    /// Scientific pitch name, e.g. "A#2".
    pub fn name(&self) -> String {
        format!("{}{}", self.pitch_class, self.octave)
    }
}

/// Equal-temperament frequency of a MIDI note, rounded to 0.01 Hz.
fn midi_frequency(midi: i32) -> f32 {
    let exact = A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0);
    (exact * 100.0).round() / 100.0
}

/// Highest-pitched open string whose frequency does not exceed `frequency`.
fn home_string(frequency: f32) -> u8 {
    STRING_FREQUENCIES
        .iter()
        .position(|&open| open <= frequency + 1e-3)
        .map(|index| index as u8 + 1)
        .unwrap_or(STRING_COUNT)
}

/// The chromatic table from E2 to C5, built once at first use.
static NOTES: Lazy<Vec<NoteEntry>> = Lazy::new(|| {
    (LOWEST_NOTE_MIDI..=HIGHEST_NOTE_MIDI)
        .map(|midi| {
            let frequency = midi_frequency(midi);
            NoteEntry {
                frequency,
                pitch_class: PitchClass::from_semitone(midi),
                string_number: home_string(frequency),
                octave: midi / 12 - 1,
            }
        })
        .collect()
});

/// Scientific pitch name to table index.
static NOTE_MAP: Lazy<BTreeMap<String, usize>> = Lazy::new(|| {
    NOTES
        .iter()
        .enumerate()
        .map(|(i, note)| (note.name(), i))
        .collect()
});

/// The full chromatic table, ordered by ascending frequency.
pub fn chromatic_notes() -> &'static [NoteEntry] {
    &NOTES
}

/// Looks up a note such as "E2" or "C#4" in the chromatic table.
pub fn find_note_by_name(name: &str) -> Option<&'static NoteEntry> {
    NOTE_MAP.get(name).map(|&i| &NOTES[i])
}

/// Reference frequency of a string, or `None` outside 1..=6.
pub fn string_frequency(string_number: u8) -> Option<f32> {
    match string_number {
        1..=STRING_COUNT => Some(STRING_FREQUENCIES[string_number as usize - 1]),
        _ => None,
    }
}

/// Scientific pitch name of an open string, or `None` outside 1..=6.
pub fn string_name(string_number: u8) -> Option<&'static str> {
    match string_number {
        1..=STRING_COUNT => Some(STRING_NAMES[string_number as usize - 1]),
        _ => None,
    }
}

/// Finds the open string closest to `frequency`.
///
/// # Returns
/// * `(string_number, reference_frequency)` - ties go to the lower string number
pub fn find_closest_string(frequency: f32) -> (u8, f32) {
    let mut closest = (1, STRING_FREQUENCIES[0]);
    let mut min_diff = (frequency - STRING_FREQUENCIES[0]).abs();
    for (i, &reference) in STRING_FREQUENCIES.iter().enumerate().skip(1) {
        let diff = (frequency - reference).abs();
        if diff < min_diff {
            min_diff = diff;
            closest = (i as u8 + 1, reference);
        }
    }
    closest
}

/// Nearest entry of an arbitrary note table.
///
/// # Returns
/// * `Some((index, entry))` - ties go to the earlier entry
/// * `None` - the table is empty
pub fn find_closest_note_in(table: &[NoteEntry], frequency: f32) -> Option<(usize, &NoteEntry)> {
    let mut best: Option<(usize, &NoteEntry, f32)> = None;
    for (i, note) in table.iter().enumerate() {
        let diff = (frequency - note.frequency).abs();
        if best.is_none_or(|(_, _, min_diff)| diff < min_diff) {
            best = Some((i, note, diff));
        }
    }
    best.map(|(i, note, _)| (i, note))
}

/// Nearest entry of the chromatic table.
pub fn find_closest_note(frequency: f32) -> Option<(usize, &'static NoteEntry)> {
    find_closest_note_in(chromatic_notes(), frequency)
}
