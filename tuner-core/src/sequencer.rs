//! # Spoken Feedback Sequencer
//!
//! The simpler of the two feedback modes: after each reading it announces
//! the string, a rough cent magnitude and the direction as a short sequence
//! of pre-recorded clips ("A ... ten cents ... up").
//!
//! The sequencer only decides which clip comes next. Playing it is up to
//! the caller, which advances the sequence with [`AudioSequencer::update`]
//! once the previous clip has finished.

use serde::Serialize;

use crate::TuningResult;
use crate::tuning::Direction;

/// A pre-recorded feedback clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedbackClip {
    /// Name of an open string (1 = high E ... 6 = low E)
    StringName(u8),
    TenCents,
    TwentyCents,
    TuneUp,
    TuneDown,
    InTune,
}

impl FeedbackClip {
    /// File name of the clip on the playback medium.
    ///
    /// Both E strings share one recording.
    pub fn file_name(self) -> Option<&'static str> {
        let name = match self {
            FeedbackClip::StringName(1 | 6) => "E.WAV",
            FeedbackClip::StringName(2) => "B.WAV",
            FeedbackClip::StringName(3) => "G.WAV",
            FeedbackClip::StringName(4) => "D.WAV",
            FeedbackClip::StringName(5) => "A.WAV",
            FeedbackClip::StringName(_) => return None,
            FeedbackClip::TenCents => "10CENTS.WAV",
            FeedbackClip::TwentyCents => "20CENTS.WAV",
            FeedbackClip::TuneUp => "UP.WAV",
            FeedbackClip::TuneDown => "DOWN.WAV",
            FeedbackClip::InTune => "IN_TUNE.WAV",
        };
        Some(name)
    }
}

/// Clip describing the size of an offset; nothing below 5 cents.
pub fn cents_clip(cents_offset: f32) -> Option<FeedbackClip> {
    let magnitude = cents_offset.abs();
    if magnitude.is_nan() || magnitude < 5.0 {
        None
    } else if magnitude < 15.0 {
        Some(FeedbackClip::TenCents)
    } else {
        Some(FeedbackClip::TwentyCents)
    }
}

/// Clip for a direction. `Unknown` has none.
pub fn direction_clip(direction: Direction) -> Option<FeedbackClip> {
    match direction {
        Direction::Up => Some(FeedbackClip::TuneUp),
        Direction::Down => Some(FeedbackClip::TuneDown),
        Direction::InTune => Some(FeedbackClip::InTune),
        Direction::Unknown => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequenceStep {
    String,
    Cents,
    Direction,
    Done,
}

/// Three-step announcement state machine.
///
/// Each call to [`AudioSequencer::update`] advances exactly one step, with
/// no timing of its own. A step that has nothing to say still consumes a
/// call and yields `None`.
#[derive(Debug, Clone, Default)]
pub struct AudioSequencer {
    result: Option<TuningResult>,
    step: Option<SequenceStep>,
}

impl AudioSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts announcing `result`, abandoning any sequence in progress.
    pub fn start(&mut self, result: &TuningResult) {
        log::debug!(
            "[SEQ] Announcing string {:?}, {:+.1} cents, {}",
            result.detected_string,
            result.cents_offset,
            result.direction
        );
        self.result = Some(result.clone());
        self.step = Some(SequenceStep::String);
    }

    pub fn is_playing(&self) -> bool {
        self.step.is_some()
    }

    /// The step the next [`AudioSequencer::update`] will run.
    pub fn step(&self) -> Option<SequenceStep> {
        self.step
    }

    /// Advances one step and returns the clip to play, if any.
    pub fn update(&mut self) -> Option<FeedbackClip> {
        let step = self.step?;
        let result = self.result.as_ref()?;
        let known = result.direction != Direction::Unknown;

        let (clip, next) = match step {
            SequenceStep::String => (
                result.detected_string.map(FeedbackClip::StringName),
                Some(SequenceStep::Cents),
            ),
            SequenceStep::Cents => {
                let clip = if known && result.direction != Direction::InTune {
                    cents_clip(result.cents_offset)
                } else {
                    None
                };
                (clip, Some(SequenceStep::Direction))
            }
            SequenceStep::Direction => (direction_clip(result.direction), Some(SequenceStep::Done)),
            SequenceStep::Done => (None, None),
        };
        if next.is_none() {
            log::debug!("[SEQ] Announcement complete");
            self.result = None;
        }
        self.step = next;
        if let Some(clip) = clip {
            log::trace!("[SEQ] Play {:?}", clip);
        }
        clip
    }
}
