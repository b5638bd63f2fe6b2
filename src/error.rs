use crate::session::Phase;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypingError {
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("word source is empty, cannot generate a passage")]
    InsufficientWordSource,

    #[error("word count must be positive, got {0}")]
    InvalidWordCount(usize),

    #[error("cannot {action} while session is {phase}")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("score must be finite, got {wpm} wpm at {accuracy}% accuracy")]
    InvalidScore { wpm: f64, accuracy: f64 },

    #[error("failed to save scores to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TypingError>;
