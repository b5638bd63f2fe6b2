use crate::app_dirs::AppDirs;
use crate::difficulty::DifficultyTable;
use crate::error::{Result, TypingError};
use crate::leaderboard::DEFAULT_MAX_ENTRIES;
use crate::word_source::{WordSource, DEFAULT_WORD_LIST};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Everything read once at startup and handed to each component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub max_high_scores: usize,
    /// Name of a bundled word list
    pub word_list: String,
    /// Overrides `word_list` when set
    pub word_list_file: Option<PathBuf>,
    pub scores_file: Option<PathBuf>,
    pub difficulties: DifficultyTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_high_scores: DEFAULT_MAX_ENTRIES,
            word_list: DEFAULT_WORD_LIST.to_string(),
            word_list_file: None,
            scores_file: None,
            difficulties: DifficultyTable::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.max_high_scores == 0 {
            return Err(TypingError::Config(
                "max_high_scores must be at least 1".into(),
            ));
        }
        self.difficulties.validate()
    }

    pub fn scores_path(&self) -> PathBuf {
        self.scores_file
            .clone()
            .unwrap_or_else(AppDirs::scores_path)
    }

    /// The configured word list. A file that cannot be read falls back to
    /// the bundled list with a warning.
    pub fn load_words(&self) -> Result<WordSource> {
        if let Some(ref path) = self.word_list_file {
            match WordSource::from_file(path) {
                Ok(source) => return Ok(source),
                Err(e) => warn!(
                    path = %path.display(),
                    "cannot load word list, using bundled '{}': {e}",
                    self.word_list
                ),
            }
        }
        WordSource::bundled(&self.word_list)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            return Settings::default();
        };
        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring malformed config: {e}");
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)
    }
}
