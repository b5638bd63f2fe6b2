use crate::error::{Result, TypingError};
use crate::word_source::WordSource;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Builds target passages from a word source
#[derive(Debug, Clone)]
pub struct TextGenerator<R: Rng = StdRng> {
    rng: R,
}

impl TextGenerator<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator, same seed gives the same passages
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for TextGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TextGenerator<R> {
    pub fn generate(&mut self, source: &WordSource, word_count: usize) -> Result<String> {
        let text = generate_text(source.words(), word_count, &mut self.rng)?;
        debug!(word_count, "generated passage");
        Ok(text)
    }
}

/// Samples `word_count` words without replacement and joins them with single
/// spaces. A source smaller than `word_count` is repeated until it is large
/// enough, so the degenerate case may contain duplicates.
pub fn generate_text<R: Rng + ?Sized>(
    words: &[String],
    word_count: usize,
    rng: &mut R,
) -> Result<String> {
    if word_count == 0 {
        return Err(TypingError::InvalidWordCount(word_count));
    }
    if words.is_empty() {
        return Err(TypingError::InsufficientWordSource);
    }

    if words.len() >= word_count {
        return Ok(words.choose_multiple(rng, word_count).join(" "));
    }

    let copies = word_count.div_ceil(words.len());
    let pool: Vec<&String> = words.iter().cycle().take(words.len() * copies).collect();
    Ok(pool.choose_multiple(rng, word_count).join(" "))
}
