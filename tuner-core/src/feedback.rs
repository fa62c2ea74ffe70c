//! # Beep Feedback Module
//!
//! Maps the magnitude of a cent offset to a beep repetition interval and
//! schedules beeps against a caller-supplied millisecond clock.
//!
//! The farther the string is out of tune, the faster the beeps. Inside the
//! in-tune window no beeps are produced at all.

use serde::Serialize;

use crate::TuningResult;
use crate::tuning::Direction;

/// Length of a single beep in milliseconds.
pub const BEEP_DURATION_MS: u32 = 50;

/// One row of the offset-to-interval table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepRate {
    /// Lowest absolute offset (cents) this row applies to
    pub min_cents: u32,
    /// Time between beep onsets in milliseconds
    pub interval_ms: u32,
}

/// Beep rates, from the largest offset to the smallest.
pub const BEEP_RATES: [BeepRate; 7] = [
    BeepRate { min_cents: 100, interval_ms: 100 },
    BeepRate { min_cents: 75, interval_ms: 150 },
    BeepRate { min_cents: 50, interval_ms: 200 },
    BeepRate { min_cents: 40, interval_ms: 300 },
    BeepRate { min_cents: 25, interval_ms: 500 },
    BeepRate { min_cents: 15, interval_ms: 800 },
    BeepRate { min_cents: 5, interval_ms: 1200 },
];

/// Beep interval for a cent offset.
///
/// The first row whose threshold the absolute offset reaches wins.
///
/// # Returns
/// * Interval in milliseconds, or `0` when the offset is below 5 cents (no beeping)
pub fn calculate_beep_interval(cents_offset: f32) -> u32 {
    let magnitude = cents_offset.abs();
    if !magnitude.is_finite() {
        return 0;
    }
    BEEP_RATES
        .iter()
        .find(|rate| magnitude >= rate.min_cents as f32)
        .map(|rate| rate.interval_ms)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BeepState {
    Idle,
    Active,
}

/// A beep the platform layer should play now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeepEvent {
    pub at_ms: u64,
    pub duration_ms: u32,
    pub interval_ms: u32,
}

/// Periodic beep scheduler.
///
/// Feed it the newest [`TuningResult`] with [`BeepScheduler::set_result`] and
/// poll [`BeepScheduler::update`] with the current time. The interval is
/// recomputed on every poll, so the rate follows the player's adjustments.
#[derive(Debug, Clone)]
pub struct BeepScheduler {
    state: BeepState,
    cents_offset: f32,
    direction: Direction,
    last_beep_ms: Option<u64>,
}

impl Default for BeepScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BeepScheduler {
    pub fn new() -> Self {
        Self {
            state: BeepState::Idle,
            cents_offset: 0.0,
            direction: Direction::Unknown,
            last_beep_ms: None,
        }
    }

    pub fn state(&self) -> BeepState {
        self.state
    }

    /// Stores the newest result, replacing the previous one.
    pub fn set_result(&mut self, result: &TuningResult) {
        self.cents_offset = result.cents_offset;
        self.direction = result.direction;

        let should_beep = result.direction != Direction::Unknown
            && calculate_beep_interval(result.cents_offset) > 0;
        match (self.state, should_beep) {
            (BeepState::Idle, true) => {
                log::debug!("[BEEP] Activated at {:+.1} cents", result.cents_offset);
                self.state = BeepState::Active;
                self.last_beep_ms = None;
            }
            (BeepState::Active, false) => {
                log::debug!("[BEEP] Stopped ({})", result.direction);
                self.state = BeepState::Idle;
            }
            _ => {}
        }
    }

    /// Current interval in milliseconds, `0` when idle.
    pub fn interval_ms(&self) -> u32 {
        match self.state {
            BeepState::Idle => 0,
            BeepState::Active => calculate_beep_interval(self.cents_offset),
        }
    }

    /// Polls the scheduler.
    ///
    /// The first poll after activation beeps immediately. After that a beep
    /// is due once `now_ms` is at least one interval past the previous beep.
    pub fn update(&mut self, now_ms: u64) -> Option<BeepEvent> {
        let interval_ms = self.interval_ms();
        if interval_ms == 0 {
            return None;
        }
        let due = match self.last_beep_ms {
            Some(last) => now_ms >= last.saturating_add(interval_ms as u64),
            None => true,
        };
        if !due {
            return None;
        }
        self.last_beep_ms = Some(now_ms);
        log::trace!("[BEEP] Beep at {} ms (every {} ms)", now_ms, interval_ms);
        Some(BeepEvent {
            at_ms: now_ms,
            duration_ms: BEEP_DURATION_MS,
            interval_ms,
        })
    }
}
