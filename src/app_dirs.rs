use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "typespeed";

/// Default on-disk locations, falling back to the working directory when no
/// home directory can be resolved
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    pub fn config_path() -> PathBuf {
        Self::project()
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("typespeed_config.json"))
    }

    pub fn scores_path() -> PathBuf {
        Self::project()
            .map(|pd| pd.data_local_dir().join("scores.json"))
            .unwrap_or_else(|| PathBuf::from("typespeed_scores.json"))
    }
}
