// Library surface for the binary, headless drivers and integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod difficulty;
pub mod driver;
pub mod error;
pub mod generator;
pub mod leaderboard;
pub mod metrics;
pub mod runtime;
pub mod session;
pub mod util;
pub mod word_source;

pub use difficulty::{DifficultySettings, DifficultyTable};
pub use error::{Result, TypingError};
pub use leaderboard::{FileScoreStore, Leaderboard, MemoryScoreStore, ScoreEntry, ScoreStore};
pub use metrics::{calculate_accuracy, calculate_wpm, SessionResult};
pub use session::{Phase, Session};
pub use word_source::WordSource;
