//! Glue between raw events and the core: keeps the typed buffer, decides when
//! an attempt is over and hands the result to the leaderboard.

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TypingError};
use crate::leaderboard::{Leaderboard, ScoreEntry, ScoreStore};
use crate::metrics::SessionResult;
use crate::runtime::AppEvent;
use crate::session::{LiveMetrics, Phase, Session};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Char(char),
    Backspace,
    Abort,
}

impl Input {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        match key.code {
            KeyCode::Esc => Some(Self::Abort),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Self::Abort)
            }
            KeyCode::Backspace => Some(Self::Backspace),
            KeyCode::Char(c) => Some(Self::Char(c)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FinishReason {
    #[strum(to_string = "completed")]
    Completed,
    #[strum(to_string = "time up")]
    TimeUp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reason: FinishReason,
    pub result: SessionResult,
    pub personal_best: Option<ScoreEntry>,
    pub is_new_best: bool,
    /// Set when the score was kept in memory but could not be written
    pub save_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Continue,
    Finished(Completion),
    Aborted,
}

/// One attempt as seen from the keyboard
#[derive(Debug)]
pub struct TypingTest<C: Clock = SystemClock, R: Rng = StdRng> {
    session: Session<C, R>,
    typed: String,
}

impl<C: Clock, R: Rng> TypingTest<C, R> {
    pub fn new(session: Session<C, R>) -> Self {
        Self {
            session,
            typed: String::new(),
        }
    }

    pub fn start(&mut self, difficulty: &str) -> Result<()> {
        self.session.start(difficulty)?;
        self.typed.clear();
        Ok(())
    }

    /// Feeds one event. Finishing happens at most once per attempt: after it
    /// the session is no longer running and further events are ignored.
    ///
    /// Any event seen after the time limit ends the attempt before it is
    /// applied, so a late key cannot complete the passage.
    pub fn handle<S: ScoreStore>(
        &mut self,
        event: &AppEvent,
        board: &mut Leaderboard<S>,
    ) -> Result<Outcome> {
        if self.session.phase() != Phase::Running {
            return Ok(Outcome::Continue);
        }
        if self.session.is_time_up() {
            return self.finish(FinishReason::TimeUp, board);
        }

        match event {
            AppEvent::Key(key) => match Input::from_key(key) {
                Some(input) => self.apply(input, board),
                None => Ok(Outcome::Continue),
            },
            AppEvent::Tick | AppEvent::Resize => Ok(Outcome::Continue),
        }
    }

    pub fn apply<S: ScoreStore>(
        &mut self,
        input: Input,
        board: &mut Leaderboard<S>,
    ) -> Result<Outcome> {
        if self.session.phase() != Phase::Running {
            return Ok(Outcome::Continue);
        }

        match input {
            Input::Char(c) => {
                self.typed.push(c);
                if self.session.is_complete(&self.typed) {
                    return self.finish(FinishReason::Completed, board);
                }
            }
            Input::Backspace => {
                self.typed.pop();
            }
            Input::Abort => {
                debug!("attempt abandoned");
                self.session.reset();
                self.typed.clear();
                return Ok(Outcome::Aborted);
            }
        }
        Ok(Outcome::Continue)
    }

    fn finish<S: ScoreStore>(
        &mut self,
        reason: FinishReason,
        board: &mut Leaderboard<S>,
    ) -> Result<Outcome> {
        // the attempt is over even if the leaderboard calls below fail
        let result = self.session.finish(&self.typed)?;
        let difficulty = self
            .session
            .difficulty()
            .map(str::to_string)
            .unwrap_or_default();
        let previous_best = board.personal_best(&difficulty)?;

        let save_error = match board.add_score(&difficulty, result.wpm, result.accuracy) {
            Ok(_) => None,
            Err(e @ TypingError::Persistence { .. }) => {
                warn!("{e}");
                Some(e.to_string())
            }
            Err(e) => return Err(e),
        };

        let is_new_best = previous_best.map_or(true, |best| result.wpm > best.wpm);
        debug!(%reason, wpm = result.wpm, is_new_best, "attempt finished");

        Ok(Outcome::Finished(Completion {
            reason,
            result,
            personal_best: board.personal_best(&difficulty)?,
            is_new_best,
            save_error,
        }))
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn live_metrics(&self) -> LiveMetrics {
        self.session.live_metrics(&self.typed)
    }

    pub fn session(&self) -> &Session<C, R> {
        &self.session
    }
}
