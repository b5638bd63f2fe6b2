use crate::app_dirs::AppDirs;
use crate::difficulty::DifficultyTable;
use crate::error::{Result, TypingError};
use crate::util::{mean, round_to};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ENTRIES: usize = 10;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One recorded result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub wpm: f64,
    pub accuracy: f64,
    #[serde(alias = "date")]
    pub timestamp: String,
}

impl ScoreEntry {
    /// Stamps the entry with the current local time, figures rounded to one
    /// decimal
    pub fn new(wpm: f64, accuracy: f64) -> Self {
        Self {
            wpm: round_to(wpm, 1),
            accuracy: round_to(accuracy, 1),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Parses the timestamp, accepting ISO-8601 as written by older files
    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }

    fn is_valid(&self) -> bool {
        self.wpm.is_finite() && self.accuracy.is_finite()
    }
}

/// Aggregate view of one difficulty's table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub count: usize,
    pub best_wpm: Option<f64>,
    pub mean_wpm: Option<f64>,
    pub mean_accuracy: Option<f64>,
}

pub type Scores = BTreeMap<String, Vec<ScoreEntry>>;

/// Backing storage for the leaderboard document
pub trait ScoreStore {
    /// The raw persisted document, `None` when absent or unreadable
    fn load(&self) -> Option<Value>;
    fn save(&self, doc: &Value) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileScoreStore {
    path: PathBuf,
}

impl FileScoreStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::scores_path(),
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

    fn write_atomically(&self, doc: &Value) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let temp_file = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(&temp_file);
            serde_json::to_writer_pretty(&mut writer, doc)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ScoreStore for FileScoreStore {
    fn load(&self) -> Option<Value> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no scores file yet");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), "cannot read scores file: {e}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(path = %self.path.display(), "discarding malformed scores file: {e}");
                None
            }
        }
    }

    fn save(&self, doc: &Value) -> Result<()> {
        self.write_atomically(doc)
            .map_err(|source| TypingError::Persistence {
                path: self.path.clone(),
                source,
            })
    }
}

/// In-memory store. Clones share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    doc: Rc<RefCell<Option<Value>>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: Value) -> Self {
        Self {
            doc: Rc::new(RefCell::new(Some(doc))),
        }
    }
}

impl ScoreStore for MemoryScoreStore {
    fn load(&self) -> Option<Value> {
        self.doc.borrow().clone()
    }

    fn save(&self, doc: &Value) -> Result<()> {
        *self.doc.borrow_mut() = Some(doc.clone());
        Ok(())
    }
}

/// Per-difficulty top-N tables, best first.
///
/// Ordered by wpm descending, ties broken by accuracy descending, remaining
/// ties keep insertion order. The leaderboard is the only writer of its store.
///
/// Tables for difficulties missing from the current [`DifficultyTable`] are
/// not served, but they are written back untouched on every save.
#[derive(Debug)]
pub struct Leaderboard<S: ScoreStore = FileScoreStore> {
    store: S,
    scores: Scores,
    retired: Map<String, Value>,
    max_entries: usize,
}

impl<S: ScoreStore> Leaderboard<S> {
    /// Loads whatever is readable from `store`. Unreadable data is dropped per
    /// difficulty; this never fails.
    pub fn open(store: S, difficulties: &DifficultyTable, max_entries: usize) -> Self {
        let mut scores: Scores = difficulties
            .names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();

        let mut retired = Map::new();
        match store.load() {
            Some(Value::Object(doc)) => {
                for (name, value) in doc {
                    match scores.get_mut(&name) {
                        Some(list) => *list = parse_entries(&name, &value, max_entries),
                        None => {
                            debug!(difficulty = %name, "keeping scores for unconfigured difficulty");
                            retired.insert(name, value);
                        }
                    }
                }
            }
            Some(_) => warn!("scores document is not an object, starting empty"),
            None => {}
        }

        Self {
            store,
            scores,
            retired,
            max_entries,
        }
    }

    /// Records a result, keeps the table sorted and bounded, then persists.
    ///
    /// A persistence error leaves the in-memory table updated and usable.
    /// Non-finite figures are rejected before anything changes.
    pub fn add_score(&mut self, difficulty: &str, wpm: f64, accuracy: f64) -> Result<ScoreEntry> {
        let list = self
            .scores
            .get_mut(difficulty)
            .ok_or_else(|| TypingError::UnknownDifficulty(difficulty.to_string()))?;

        let entry = ScoreEntry::new(wpm, accuracy);
        if !entry.is_valid() {
            return Err(TypingError::InvalidScore { wpm, accuracy });
        }
        list.push(entry.clone());
        sort_entries(list);
        list.truncate(self.max_entries);
        info!(difficulty, wpm = entry.wpm, accuracy = entry.accuracy, "score recorded");

        if let Err(e) = self.persist() {
            warn!("scores will not be saved: {e}");
            return Err(e);
        }
        Ok(entry)
    }

    /// Copy of one difficulty's table, best first
    pub fn get_scores(&self, difficulty: &str) -> Result<Vec<ScoreEntry>> {
        self.scores
            .get(difficulty)
            .cloned()
            .ok_or_else(|| TypingError::UnknownDifficulty(difficulty.to_string()))
    }

    pub fn personal_best(&self, difficulty: &str) -> Result<Option<ScoreEntry>> {
        Ok(self.get_scores(difficulty)?.into_iter().next())
    }

    pub fn summary(&self, difficulty: &str) -> Result<ScoreSummary> {
        let list = self.get_scores(difficulty)?;
        let wpms: Vec<f64> = list.iter().map(|e| e.wpm).collect();
        let accuracies: Vec<f64> = list.iter().map(|e| e.accuracy).collect();
        Ok(ScoreSummary {
            count: list.len(),
            best_wpm: wpms.first().copied(),
            mean_wpm: mean(&wpms).map(|m| round_to(m, 1)),
            mean_accuracy: mean(&accuracies).map(|m| round_to(m, 1)),
        })
    }

    /// Empties every table, including retired ones, and persists the empty
    /// document
    pub fn clear(&mut self) -> Result<()> {
        self.scores.values_mut().for_each(Vec::clear);
        self.retired.clear();
        info!("leaderboard cleared");
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let mut doc = self.retired.clone();
        for (name, list) in &self.scores {
            doc.insert(name.clone(), serde_json::to_value(list)?);
        }
        self.store.save(&Value::Object(doc))
    }

    pub fn difficulties(&self) -> impl Iterator<Item = &str> {
        self.scores.keys().map(String::as_str)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn sort_entries(list: &mut [ScoreEntry]) {
    list.sort_by(|a, b| {
        b.wpm
            .total_cmp(&a.wpm)
            .then_with(|| b.accuracy.total_cmp(&a.accuracy))
    });
}

/// Keeps the entries that have the expected shape
fn parse_entries(difficulty: &str, value: &Value, max_entries: usize) -> Vec<ScoreEntry> {
    let Some(items) = value.as_array() else {
        warn!(difficulty, "scores are not a list, discarding");
        return Vec::new();
    };

    let mut entries: Vec<ScoreEntry> = items
        .iter()
        .filter_map(|item| serde_json::from_value::<ScoreEntry>(item.clone()).ok())
        .filter(ScoreEntry::is_valid)
        .collect();

    if entries.len() < items.len() {
        warn!(
            difficulty,
            dropped = items.len() - entries.len(),
            "discarding unreadable score entries"
        );
    }

    sort_entries(&mut entries);
    entries.truncate(max_entries);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use tempfile::tempdir;

    fn board() -> Leaderboard<MemoryScoreStore> {
        Leaderboard::open(
            MemoryScoreStore::new(),
            &DifficultyTable::default(),
            DEFAULT_MAX_ENTRIES,
        )
    }

    fn wpms(list: &[ScoreEntry]) -> Vec<f64> {
        list.iter().map(|e| e.wpm).collect()
    }

    #[test]
    fn starts_empty_for_every_difficulty() {
        let board = board();
        assert_eq!(board.difficulties().collect::<Vec<_>>(), vec!["easy", "hard", "medium"]);
        for d in ["easy", "medium", "hard"] {
            assert!(board.get_scores(d).unwrap().is_empty());
            assert_eq!(board.personal_best(d).unwrap(), None);
        }
    }

    #[test]
    fn scores_are_sorted_best_first() {
        let mut board = board();
        board.add_score("medium", 50.5, 95.0).unwrap();
        board.add_score("medium", 60.0, 98.0).unwrap();
        board.add_score("medium", 45.0, 92.0).unwrap();

        assert_eq!(wpms(&board.get_scores("medium").unwrap()), vec![60.0, 50.5, 45.0]);
    }

    #[test]
    fn equal_wpm_is_broken_by_accuracy() {
        let mut board = board();
        board.add_score("easy", 40.0, 90.0).unwrap();
        board.add_score("easy", 40.0, 97.5).unwrap();
        board.add_score("easy", 40.0, 93.0).unwrap();

        let accuracies: Vec<f64> = board
            .get_scores("easy")
            .unwrap()
            .iter()
            .map(|e| e.accuracy)
            .collect();
        assert_eq!(accuracies, vec![97.5, 93.0, 90.0]);
    }

    #[test]
    fn keeps_only_the_best_entries() {
        let mut board = board();
        for i in 0..DEFAULT_MAX_ENTRIES + 5 {
            board.add_score("medium", 50.0 + i as f64, 95.0).unwrap();
        }

        let scores = board.get_scores("medium").unwrap();
        assert_eq!(scores.len(), DEFAULT_MAX_ENTRIES);
        assert_eq!(scores[0].wpm, 64.0);
        assert_eq!(scores[DEFAULT_MAX_ENTRIES - 1].wpm, 55.0);
    }

    #[test]
    fn low_score_does_not_enter_full_table() {
        let mut board = Leaderboard::open(MemoryScoreStore::new(), &DifficultyTable::default(), 3);
        for wpm in [70.0, 80.0, 90.0] {
            board.add_score("hard", wpm, 99.0).unwrap();
        }
        board.add_score("hard", 10.0, 100.0).unwrap();
        assert_eq!(wpms(&board.get_scores("hard").unwrap()), vec![90.0, 80.0, 70.0]);
    }

    #[test]
    fn difficulties_are_separate() {
        let mut board = board();
        board.add_score("easy", 40.0, 90.0).unwrap();
        board.add_score("medium", 50.0, 85.0).unwrap();

        assert_eq!(board.get_scores("easy").unwrap().len(), 1);
        assert_eq!(board.get_scores("medium").unwrap().len(), 1);
        assert!(board.get_scores("hard").unwrap().is_empty());
    }

    #[test]
    fn personal_best_is_first_entry() {
        let mut board = board();
        board.add_score("easy", 40.0, 90.0).unwrap();
        board.add_score("easy", 45.0, 85.0).unwrap();

        let best = board.personal_best("easy").unwrap().unwrap();
        assert_eq!(best.wpm, 45.0);
        assert_eq!(best.accuracy, 85.0);
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        let mut board = board();
        assert_matches!(
            board.add_score("nightmare", 99.0, 100.0),
            Err(TypingError::UnknownDifficulty(_))
        );
        assert_matches!(board.get_scores("nightmare"), Err(TypingError::UnknownDifficulty(_)));
        assert_matches!(board.personal_best("nightmare"), Err(TypingError::UnknownDifficulty(_)));
    }

    #[test]
    fn returned_scores_are_a_copy() {
        let mut board = board();
        board.add_score("easy", 40.0, 90.0).unwrap();

        let mut copy = board.get_scores("easy").unwrap();
        copy.clear();
        assert_eq!(board.get_scores("easy").unwrap().len(), 1);
    }

    #[test]
    fn entries_are_rounded_and_stamped() {
        let mut board = board();
        let entry = board.add_score("easy", 41.26, 89.94).unwrap();
        assert_eq!(entry.wpm, 41.3);
        assert_eq!(entry.accuracy, 89.9);
        assert!(entry.recorded_at().is_some());
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let store = MemoryScoreStore::new();
        let mut board = Leaderboard::open(store.clone(), &DifficultyTable::default(), 10);

        assert_matches!(
            board.add_score("easy", f64::NAN, 90.0),
            Err(TypingError::InvalidScore { .. })
        );
        assert_matches!(
            board.add_score("easy", 40.0, f64::INFINITY),
            Err(TypingError::InvalidScore { .. })
        );
        assert!(board.get_scores("easy").unwrap().is_empty());
        assert_eq!(store.load(), None);

        board.add_score("easy", 40.0, 90.0).unwrap();
        let reopened = Leaderboard::open(store, &DifficultyTable::default(), 10);
        assert_eq!(reopened.get_scores("easy").unwrap(), board.get_scores("easy").unwrap());
    }

    #[test]
    fn unconfigured_difficulties_survive_a_save() {
        let retired = json!([{"wpm": 99.0, "accuracy": 99.0, "timestamp": "2024-01-01 10:00:00"}]);
        let store = MemoryScoreStore::with_document(json!({ "insane": retired.clone() }));
        let mut board = Leaderboard::open(store.clone(), &DifficultyTable::default(), 10);

        assert_matches!(board.get_scores("insane"), Err(TypingError::UnknownDifficulty(_)));
        board.add_score("easy", 40.0, 90.0).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc["insane"], retired);
        assert_eq!(doc["easy"][0]["wpm"], 40.0);
    }

    #[test]
    fn clear_drops_unconfigured_difficulties_too() {
        let store = MemoryScoreStore::with_document(json!({ "insane": [] , "easy": []}));
        let mut board = Leaderboard::open(store.clone(), &DifficultyTable::default(), 10);
        board.clear().unwrap();

        let doc = store.load().unwrap();
        assert!(doc.get("insane").is_none());
        assert_eq!(doc["easy"], json!([]));
    }

    #[test]
    fn summary_of_table() {
        let mut board = board();
        assert_eq!(
            board.summary("easy").unwrap(),
            ScoreSummary {
                count: 0,
                best_wpm: None,
                mean_wpm: None,
                mean_accuracy: None
            }
        );

        board.add_score("easy", 40.0, 90.0).unwrap();
        board.add_score("easy", 50.0, 100.0).unwrap();
        let summary = board.summary("easy").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.best_wpm, Some(50.0));
        assert_eq!(summary.mean_wpm, Some(45.0));
        assert_eq!(summary.mean_accuracy, Some(95.0));
    }

    #[test]
    fn clear_empties_and_persists() {
        let store = MemoryScoreStore::new();
        let mut board = Leaderboard::open(store.clone(), &DifficultyTable::default(), 10);
        board.add_score("easy", 40.0, 90.0).unwrap();
        board.clear().unwrap();

        assert!(board.get_scores("easy").unwrap().is_empty());
        let reopened = Leaderboard::open(store, &DifficultyTable::default(), 10);
        assert!(reopened.get_scores("easy").unwrap().is_empty());
    }

    #[test]
    fn partially_valid_document_keeps_what_parses() {
        let doc = json!({
            "easy": [
                {"wpm": 30.0, "accuracy": 90.0, "timestamp": "2024-01-01 10:00:00"},
                {"wpm": "fast", "accuracy": 90.0, "timestamp": "2024-01-01 10:00:00"},
                {"wpm": 50.0, "accuracy": 80.0, "date": "2024-01-02T09:30:00.123456"}
            ],
            "medium": "not a list",
            "hard": [{"accuracy": 10.0}],
            "insane": [{"wpm": 1.0, "accuracy": 1.0, "timestamp": "x"}]
        });
        let board = Leaderboard::open(
            MemoryScoreStore::with_document(doc),
            &DifficultyTable::default(),
            10,
        );

        let easy = board.get_scores("easy").unwrap();
        assert_eq!(wpms(&easy), vec![50.0, 30.0]);
        assert!(easy[0].recorded_at().is_some());
        assert!(board.get_scores("medium").unwrap().is_empty());
        assert!(board.get_scores("hard").unwrap().is_empty());
        assert_matches!(board.get_scores("insane"), Err(TypingError::UnknownDifficulty(_)));
    }

    #[test]
    fn loaded_tables_are_resorted_and_truncated() {
        let entries: Vec<Value> = (0..15u8)
            .map(|i| {
                let wpm = f64::from(i);
                json!({"wpm": wpm, "accuracy": 90.0, "timestamp": "2024-01-01 10:00:00"})
            })
            .collect();
        let board = Leaderboard::open(
            MemoryScoreStore::with_document(json!({ "medium": entries })),
            &DifficultyTable::default(),
            10,
        );

        let medium = board.get_scores("medium").unwrap();
        assert_eq!(medium.len(), 10);
        assert_eq!(medium[0].wpm, 14.0);
        assert_eq!(medium[9].wpm, 5.0);
    }

    #[test]
    fn non_object_document_starts_empty() {
        let board = Leaderboard::open(
            MemoryScoreStore::with_document(json!([1, 2, 3])),
            &DifficultyTable::default(),
            10,
        );
        assert!(board.get_scores("easy").unwrap().is_empty());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("scores.json");

        let mut board = Leaderboard::open(FileScoreStore::with_path(&path), &DifficultyTable::default(), 10);
        board.add_score("medium", 50.5, 95.0).unwrap();
        board.add_score("medium", 60.0, 98.0).unwrap();
        assert!(path.exists());

        let reopened = Leaderboard::open(FileScoreStore::with_path(&path), &DifficultyTable::default(), 10);
        assert_eq!(
            reopened.get_scores("medium").unwrap(),
            board.get_scores("medium").unwrap()
        );
    }

    #[test]
    fn corrupted_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(&path, "{ this is not json").unwrap();

        let board = Leaderboard::open(FileScoreStore::with_path(&path), &DifficultyTable::default(), 10);
        for d in ["easy", "medium", "hard"] {
            assert!(board.get_scores(d).unwrap().is_empty());
        }
    }

    #[test]
    fn write_failure_keeps_memory_state() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let path = blocker.join("scores.json");

        let mut board = Leaderboard::open(FileScoreStore::with_path(&path), &DifficultyTable::default(), 10);
        assert_matches!(
            board.add_score("easy", 42.0, 99.0),
            Err(TypingError::Persistence { .. })
        );
        assert_eq!(board.personal_best("easy").unwrap().unwrap().wpm, 42.0);

        board.add_score("easy", 50.0, 99.0).unwrap_err();
        assert_eq!(wpms(&board.get_scores("easy").unwrap()), vec![50.0, 42.0]);
    }
}
