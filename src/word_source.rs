use crate::error::Result;
use include_dir::{include_dir, Dir};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

static LANG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/lang");

pub const DEFAULT_WORD_LIST: &str = "english";

#[derive(Deserialize)]
struct WordListFile {
    words: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WordListJson {
    Object(WordListFile),
    Array(Vec<String>),
}

/// Flat ordered list of candidate words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordSource {
    words: Vec<String>,
}

impl WordSource {
    /// Entries are split on whitespace, so a line like `ice cream` counts as
    /// two words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words
                .into_iter()
                .map(Into::into)
                .flat_map(|w: String| {
                    w.split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect(),
        }
    }

    /// One of the lists compiled into the binary, e.g. `"english"` or `"code"`
    pub fn bundled(name: &str) -> Result<Self> {
        let file = LANG_DIR.get_file(format!("{name}.json")).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no bundled word list named '{name}'"),
            )
        })?;
        let contents = file.contents_utf8().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "word list is not valid UTF-8")
        })?;
        let source = Self::parse(contents)?;
        debug!(name, words = source.len(), "loaded bundled word list");
        Ok(source)
    }

    pub fn bundled_names() -> Vec<String> {
        LANG_DIR
            .files()
            .filter_map(|f| {
                let path = f.path();
                match path.extension().and_then(|e| e.to_str()) {
                    Some("json") => path.file_stem().map(|s| s.to_string_lossy().into_owned()),
                    _ => None,
                }
            })
            .collect()
    }

    /// Reads a JSON word list (`{"words": [...]}` or a bare array) or a
    /// line-delimited text file. A missing file is an error; an empty file is
    /// an empty source.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let source = Self::parse(&contents)?;
        debug!(path = %path.as_ref().display(), words = source.len(), "loaded word list file");
        Ok(source)
    }

    fn parse(contents: &str) -> Result<Self> {
        let trimmed = contents.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            let words = match serde_json::from_str::<WordListJson>(contents)? {
                WordListJson::Object(file) => file.words,
                WordListJson::Array(words) => words,
            };
            return Ok(Self::from_words(words));
        }
        Ok(Self::from_words(contents.lines()))
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
