//! Speed and accuracy figures.
//!
//! Accuracy compares whole words position by position rather than zipping
//! characters, so one dropped letter does not mark the rest of the passage
//! as wrong.

use crate::util::{count_words, round_to};
use serde::{Deserialize, Serialize};

/// Final figures for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub wpm: f64,
    pub accuracy: f64,
    /// Elapsed seconds, two decimals
    pub time: f64,
}

/// Words per minute rounded to a whole number. Non-positive elapsed time
/// gives 0.
pub fn calculate_wpm(typed_text: &str, elapsed_secs: f64) -> f64 {
    raw_wpm(typed_text, elapsed_secs).round()
}

/// Same as [`calculate_wpm`] but kept to one decimal for live display
pub fn live_wpm(typed_text: &str, elapsed_secs: f64) -> f64 {
    round_to(raw_wpm(typed_text, elapsed_secs), 1)
}

fn raw_wpm(typed_text: &str, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 || !elapsed_secs.is_finite() {
        return 0.0;
    }
    count_words(typed_text) as f64 / (elapsed_secs / 60.0)
}

/// Percentage of word positions typed exactly right, over the longer of the
/// two word sequences.
pub fn calculate_accuracy(typed_text: &str, target_text: &str) -> f64 {
    let typed: Vec<&str> = typed_text.split_whitespace().collect();
    let target: Vec<&str> = target_text.split_whitespace().collect();

    match (typed.is_empty(), target.is_empty()) {
        (true, true) => return 100.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let correct = typed
        .iter()
        .zip(target.iter())
        .filter(|(t, r)| t == r)
        .count();
    let denominator = typed.len().max(target.len());

    correct as f64 / denominator as f64 * 100.0
}
