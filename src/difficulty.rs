use crate::error::{Result, TypingError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Passage length and time budget for one difficulty
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DifficultySettings {
    #[serde(alias = "words")]
    pub word_count: usize,
    /// Seconds; `None` means untimed
    #[serde(default)]
    pub time_limit: Option<u64>,
}

impl DifficultySettings {
    pub fn new(word_count: usize, time_limit: Option<u64>) -> Self {
        Self {
            word_count,
            time_limit,
        }
    }
}

/// Fixed mapping from difficulty name to its settings.
///
/// Loaded once at startup and never mutated afterwards. Names are compared
/// exactly, so `"Easy"` and `"easy"` are different keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DifficultyTable {
    entries: BTreeMap<String, DifficultySettings>,
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self::from_entries([
            ("easy", DifficultySettings::new(15, None)),
            ("medium", DifficultySettings::new(25, Some(60))),
            ("hard", DifficultySettings::new(40, Some(45))),
        ])
    }
}

impl DifficultyTable {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, DifficultySettings)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, settings)| (name.into(), settings))
                .collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<DifficultySettings> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| TypingError::UnknownDifficulty(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Rejects empty tables, zero word counts and zero time limits
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(TypingError::Config("no difficulties configured".into()));
        }
        for (name, settings) in &self.entries {
            if settings.word_count == 0 {
                return Err(TypingError::Config(format!(
                    "difficulty '{name}' has a word count of 0"
                )));
            }
            if settings.time_limit == Some(0) {
                return Err(TypingError::Config(format!(
                    "difficulty '{name}' has a time limit of 0 seconds"
                )));
            }
        }
        Ok(())
    }
}
