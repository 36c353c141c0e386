//! # Repeat (Muraja'ah) State Machine
//!
//! Decides what happens when a verse finishes playing naturally. The decision
//! is a pure function of the repeat configuration, the loop counter and the
//! current position; applying it is the engine's job.
//!
//! Rules, in order:
//!
//! 1. **SingleVerse**: replay while the count allows, then advance one verse,
//!    or stop in place on the last verse of the surah.
//! 2. **Range**: below the range end, advance (stopping if the surah ends
//!    first). At the range end, jump back to the start while the count allows,
//!    otherwise stop parked at the range start.
//! 3. **None**: advance linearly; after the last verse, stop parked at verse 1.
//!
//! A range whose current verse lies past `range_end` (the user moved beyond the
//! range manually) follows the linear rules.

use crate::error::{PlaybackError, Result};
use crate::types::PlaybackPosition;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Repetition index within the active repeat unit. Starts at 1.
pub type LoopCounter = u32;

/// Initial value of the loop counter.
pub const LOOP_START: LoopCounter = 1;

/// Settings key holding the JSON-encoded [`RepeatConfig`].
pub const REPEAT_SETTINGS_KEY: &str = "repeatSettings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    None,
    SingleVerse,
    Range,
}

/// How many times a verse or range is heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatCount {
    Times(NonZeroU32),
    Unbounded,
}

impl RepeatCount {
    pub fn times(count: u32) -> Result<Self> {
        NonZeroU32::new(count)
            .map(RepeatCount::Times)
            .ok_or_else(|| PlaybackError::InvalidRepeatConfig("repeat count must be positive".into()))
    }

    /// Whether another pass is allowed after `loop_counter` completed passes.
    fn allows_another(&self, loop_counter: LoopCounter) -> bool {
        match self {
            RepeatCount::Unbounded => true,
            RepeatCount::Times(n) => loop_counter < n.get(),
        }
    }
}

impl Default for RepeatCount {
    /// Three passes.
    fn default() -> Self {
        RepeatCount::Times(NonZeroU32::MIN.saturating_add(2))
    }
}

/// Declarative repeat settings, edited by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatConfig {
    pub mode: RepeatMode,
    pub range_start: u16,
    pub range_end: u16,
    pub repeat_count: RepeatCount,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            mode: RepeatMode::None,
            range_start: 1,
            range_end: 1,
            repeat_count: RepeatCount::default(),
        }
    }
}

impl RepeatConfig {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single_verse(repeat_count: RepeatCount) -> Self {
        Self {
            mode: RepeatMode::SingleVerse,
            repeat_count,
            ..Self::default()
        }
    }

    pub fn range(range_start: u16, range_end: u16, repeat_count: RepeatCount) -> Self {
        Self {
            mode: RepeatMode::Range,
            range_start,
            range_end,
            repeat_count,
        }
    }

    /// Checks the range bounds that do not depend on a surah.
    pub fn validate_shape(&self) -> Result<()> {
        if self.mode != RepeatMode::Range {
            return Ok(());
        }
        if self.range_start == 0 {
            return Err(PlaybackError::InvalidRepeatConfig(
                "range start must be at least 1".into(),
            ));
        }
        if self.range_start > self.range_end {
            return Err(PlaybackError::InvalidRepeatConfig(format!(
                "range start {} is after range end {}",
                self.range_start, self.range_end
            )));
        }
        Ok(())
    }

    /// Checks `1 <= range_start <= range_end <= total_verses` in range mode.
    pub fn validate(&self, total_verses: u16) -> Result<()> {
        self.validate_shape()?;
        if self.mode == RepeatMode::Range && self.range_end > total_verses {
            return Err(PlaybackError::InvalidRepeatConfig(format!(
                "range end {} is past the last verse {}",
                self.range_end, total_verses
            )));
        }
        Ok(())
    }
}

/// What the engine should do after a natural completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDecision {
    /// Play the same verse again from the start.
    ReplayVerse,
    /// Move to the given verse of the same surah.
    Advance { verse: u16 },
    /// Restart the range at the given verse.
    JumpToRangeStart { verse: u16 },
    /// Stop playback and park the position at `rest_at`.
    Stop { rest_at: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatStep {
    pub decision: RepeatDecision,
    pub loop_counter: LoopCounter,
}

impl RepeatStep {
    fn new(decision: RepeatDecision, loop_counter: LoopCounter) -> Self {
        Self {
            decision,
            loop_counter,
        }
    }
}

/// Computes the next action for an "ended" event.
pub fn on_completion(
    config: &RepeatConfig,
    loop_counter: LoopCounter,
    position: &PlaybackPosition,
) -> RepeatStep {
    let verse = position.verse_id;

    match config.mode {
        RepeatMode::SingleVerse => {
            if config.repeat_count.allows_another(loop_counter) {
                RepeatStep::new(RepeatDecision::ReplayVerse, loop_counter.saturating_add(1))
            } else if position.is_last_verse() {
                RepeatStep::new(RepeatDecision::Stop { rest_at: verse }, LOOP_START)
            } else {
                RepeatStep::new(RepeatDecision::Advance { verse: verse + 1 }, LOOP_START)
            }
        }
        RepeatMode::Range if verse < config.range_end => {
            if position.is_last_verse() {
                RepeatStep::new(RepeatDecision::Stop { rest_at: verse }, LOOP_START)
            } else {
                RepeatStep::new(RepeatDecision::Advance { verse: verse + 1 }, loop_counter)
            }
        }
        RepeatMode::Range if verse == config.range_end => {
            if config.repeat_count.allows_another(loop_counter) {
                RepeatStep::new(
                    RepeatDecision::JumpToRangeStart {
                        verse: config.range_start,
                    },
                    loop_counter.saturating_add(1),
                )
            } else {
                RepeatStep::new(
                    RepeatDecision::Stop {
                        rest_at: config.range_start,
                    },
                    LOOP_START,
                )
            }
        }
        RepeatMode::Range | RepeatMode::None => {
            if position.is_last_verse() {
                RepeatStep::new(RepeatDecision::Stop { rest_at: 1 }, LOOP_START)
            } else {
                RepeatStep::new(RepeatDecision::Advance { verse: verse + 1 }, loop_counter)
            }
        }
    }
}
