//! Temporal stabilizer.
//!
//! Turns the jittery per-frame label stream into settled tokens: a label
//! settles once it holds a majority of a small sliding window, subject to a
//! cooldown that suppresses duplicates. A window that fails to settle for
//! too many frames is cleared so a noisy hand position cannot lock it.

use crate::defaults;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Stabilizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizerConfig {
    /// Labels kept in the consensus window.
    pub window: usize,
    /// Identical non-empty labels needed to settle.
    pub consensus: usize,
    /// Gap required after any settlement before a different token settles.
    pub switch_cooldown: Duration,
    /// Gap required before the same token settles again.
    pub repeat_cooldown: Duration,
    /// Frames without a settlement before the window is cleared.
    pub reset_after_frames: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window: defaults::STABILIZER_WINDOW,
            consensus: defaults::STABILIZER_CONSENSUS,
            switch_cooldown: Duration::from_millis(defaults::SWITCH_COOLDOWN_MS),
            repeat_cooldown: Duration::from_millis(defaults::REPEAT_COOLDOWN_MS),
            reset_after_frames: defaults::RESET_AFTER_FRAMES,
        }
    }
}

/// Where the stabilizer stands after the latest frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerState {
    /// No label holds a majority of the window.
    Collecting,
    /// The latest frame settled a token.
    Settled,
    /// A label holds a majority but the cooldown rejected it.
    Cooldown,
}

/// A token accepted by the stabilizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledToken {
    pub token: String,
    pub at: Instant,
}

/// Majority-vote debouncer over the gated label stream.
#[derive(Debug)]
pub struct Stabilizer {
    config: StabilizerConfig,
    window: VecDeque<String>,
    last: Option<SettledToken>,
    frames_without_settlement: usize,
    state: StabilizerState,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window),
            config,
            last: None,
            frames_without_settlement: 0,
            state: StabilizerState::Collecting,
        }
    }

    /// Feeds one gated label (empty = nothing recognized) observed at `now`.
    ///
    /// Returns the token if this frame settled one.
    pub fn push(&mut self, label: &str, now: Instant) -> Option<SettledToken> {
        if self.window.len() == self.config.window {
            self.window.pop_front();
        }
        self.window.push_back(label.to_string());
        self.frames_without_settlement += 1;

        match self.candidate() {
            Some(token) if self.cooldown_allows(&token, now) => {
                let settled = SettledToken { token, at: now };
                debug!(token = %settled.token, "token settled");
                self.last = Some(settled.clone());
                self.frames_without_settlement = 0;
                self.state = StabilizerState::Settled;
                return Some(settled);
            }
            Some(_) => self.state = StabilizerState::Cooldown,
            None => self.state = StabilizerState::Collecting,
        }

        if self.frames_without_settlement >= self.config.reset_after_frames {
            debug!(
                frames = self.frames_without_settlement,
                "no settlement, clearing window"
            );
            self.window.clear();
            self.frames_without_settlement = 0;
            self.state = StabilizerState::Collecting;
        }
        None
    }

    /// The label holding the consensus in a full window, if any.
    ///
    /// On a tie (only possible when `consensus` is at most half the window)
    /// the most recently seen label wins.
    fn candidate(&self) -> Option<String> {
        if self.window.len() < self.config.window {
            return None;
        }
        let mut best: Option<(&str, usize)> = None;
        for label in self.window.iter().rev() {
            if label.is_empty() {
                continue;
            }
            let count = self.window.iter().filter(|l| *l == label).count();
            if best.is_none_or(|(_, n)| count > n) {
                best = Some((label.as_str(), count));
            }
        }
        best.filter(|(_, count)| *count >= self.config.consensus)
            .map(|(label, _)| label.to_string())
    }

    fn cooldown_allows(&self, token: &str, now: Instant) -> bool {
        let Some(last) = &self.last else {
            return true;
        };
        let elapsed = now.saturating_duration_since(last.at);
        if last.token == token {
            elapsed >= self.config.repeat_cooldown
        } else {
            elapsed >= self.config.switch_cooldown
        }
    }

    pub fn state(&self) -> StabilizerState {
        self.state
    }

    pub fn last_settled(&self) -> Option<&SettledToken> {
        self.last.as_ref()
    }

    /// Labels currently in the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &str> {
        self.window.iter().map(String::as_str)
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Clears the window, the last settled token, and the frame counter.
    pub fn reset(&mut self) {
        self.window.clear();
        self.last = None;
        self.frames_without_settlement = 0;
        self.state = StabilizerState::Collecting;
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}
