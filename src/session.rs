use crate::clock::{Clock, SystemClock};
use crate::difficulty::{DifficultySettings, DifficultyTable};
use crate::error::{Result, TypingError};
use crate::generator::TextGenerator;
use crate::metrics::{calculate_accuracy, calculate_wpm, live_wpm, SessionResult};
use crate::util::round_to;
use crate::word_source::WordSource;
use rand::rngs::StdRng;
use rand::Rng;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Finished,
}

/// Figures shown while the user is still typing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveMetrics {
    pub wpm: f64,
    pub accuracy: f64,
}

/// One typing attempt: `Idle -> Running -> Finished`, with `reset` going
/// back to `Idle` from anywhere.
///
/// Time is never tracked in the background. The driver polls [`elapsed`],
/// [`remaining`] and [`is_time_up`] on its own ticks.
///
/// [`elapsed`]: Session::elapsed
/// [`remaining`]: Session::remaining
/// [`is_time_up`]: Session::is_time_up
#[derive(Debug)]
pub struct Session<C: Clock = SystemClock, R: Rng = StdRng> {
    difficulties: DifficultyTable,
    words: WordSource,
    generator: TextGenerator<R>,
    clock: C,
    phase: Phase,
    difficulty: Option<String>,
    settings: Option<DifficultySettings>,
    target_text: String,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl<C: Clock, R: Rng> Session<C, R> {
    pub fn new(
        difficulties: DifficultyTable,
        words: WordSource,
        generator: TextGenerator<R>,
        clock: C,
    ) -> Self {
        Self {
            difficulties,
            words,
            generator,
            clock,
            phase: Phase::Idle,
            difficulty: None,
            settings: None,
            target_text: String::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Generates a new passage for `difficulty` and starts the timer. On error
    /// the session is left exactly as it was.
    pub fn start(&mut self, difficulty: &str) -> Result<&str> {
        if self.phase == Phase::Running {
            return Err(TypingError::InvalidTransition {
                phase: self.phase,
                action: "start",
            });
        }

        let settings = self.difficulties.lookup(difficulty)?;
        let text = self.generator.generate(&self.words, settings.word_count)?;

        self.difficulty = Some(difficulty.to_string());
        self.settings = Some(settings);
        self.target_text = text;
        self.started_at = Some(self.clock.now());
        self.finished_at = None;
        self.phase = Phase::Running;

        debug!(
            difficulty,
            word_count = settings.word_count,
            time_limit = ?settings.time_limit,
            "session started"
        );
        Ok(&self.target_text)
    }

    /// Seconds since `start`. Frozen at the finish instant once finished.
    pub fn elapsed(&self) -> f64 {
        match (self.phase, self.started_at) {
            (Phase::Running, Some(start)) => self.clock.now().duration_since(start).as_secs_f64(),
            (Phase::Finished, Some(start)) => self
                .finished_at
                .map_or(0.0, |end| end.duration_since(start).as_secs_f64()),
            _ => 0.0,
        }
    }

    /// Whole seconds left, `None` for untimed difficulties
    pub fn remaining(&self) -> Option<u64> {
        let limit = self.time_limit()?;
        Some((limit as f64 - self.elapsed()).max(0.0) as u64)
    }

    pub fn is_time_up(&self) -> bool {
        match (self.phase, self.time_limit()) {
            (Phase::Running, Some(limit)) => self.elapsed() >= limit as f64,
            _ => false,
        }
    }

    /// Stops the timer and computes the final result. This is the only point
    /// where a result becomes eligible for the leaderboard.
    pub fn finish(&mut self, typed_text: &str) -> Result<SessionResult> {
        if self.phase != Phase::Running {
            return Err(TypingError::InvalidTransition {
                phase: self.phase,
                action: "finish",
            });
        }

        self.finished_at = Some(self.clock.now());
        self.phase = Phase::Finished;

        let elapsed = self.elapsed();
        let result = SessionResult {
            wpm: calculate_wpm(typed_text, elapsed),
            accuracy: round_to(calculate_accuracy(typed_text, &self.target_text), 2),
            time: round_to(elapsed, 2),
        };
        debug!(
            wpm = result.wpm,
            accuracy = result.accuracy,
            time = result.time,
            "session finished"
        );
        Ok(result)
    }

    /// Back to `Idle`. The selected difficulty is kept.
    pub fn reset(&mut self) {
        self.target_text.clear();
        self.started_at = None;
        self.finished_at = None;
        self.phase = Phase::Idle;
        debug!("session reset");
    }

    /// Live speed, and accuracy against the part of the target reached so far
    pub fn live_metrics(&self, typed_text: &str) -> LiveMetrics {
        let typed_words = typed_text.split_whitespace().count();
        let reached: Vec<&str> = self
            .target_text
            .split_whitespace()
            .take(typed_words)
            .collect();
        LiveMetrics {
            wpm: live_wpm(typed_text, self.elapsed()),
            accuracy: round_to(calculate_accuracy(typed_text, &reached.join(" ")), 1),
        }
    }

    /// Typed at least as many characters as the target holds
    pub fn is_complete(&self, typed_text: &str) -> bool {
        !self.target_text.is_empty()
            && typed_text.chars().count() >= self.target_text.chars().count()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    pub fn time_limit(&self) -> Option<u64> {
        self.settings.and_then(|s| s.time_limit)
    }

    pub fn word_count(&self) -> Option<usize> {
        self.settings.map(|s| s.word_count)
    }

    pub fn difficulties(&self) -> &DifficultyTable {
        &self.difficulties
    }
}
