//! The word set shared by the segmenter and the suggestion ranker.
//!
//! A [`Dictionary`] is built once and never mutated; sessions hold it behind
//! an `Arc`. Words are stored uppercase, letters only.

use crate::error::{Result, SignstreamError};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

const BUILTIN_WORDS: &str = include_str!("../data/words.txt");

static BUILTIN: OnceLock<Arc<Dictionary>> = OnceLock::new();

/// Immutable set of uppercase words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    words: BTreeSet<String>,
    max_word_len: usize,
}

impl Dictionary {
    /// Builds a dictionary from raw words.
    ///
    /// Entries are trimmed and uppercased; blank entries and entries with
    /// anything other than letters are skipped.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        let mut max_word_len = 0;
        for raw in words {
            let word = raw.as_ref().trim();
            if word.is_empty() || !word.chars().all(char::is_alphabetic) {
                continue;
            }
            let word = word.to_uppercase();
            max_word_len = max_word_len.max(word.chars().count());
            set.insert(word);
        }
        Self {
            words: set,
            max_word_len,
        }
    }

    /// Parses a word-list: one word per line, `#` comments, and an optional
    /// trailing frequency column (`hello 12345`) which is ignored.
    pub fn parse(text: &str) -> Self {
        Self::from_words(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .filter_map(|line| line.split_whitespace().next()),
        )
    }

    /// Loads a word-list file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SignstreamError::DictionaryLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let dictionary = Self::parse(&text);
        if dictionary.is_empty() {
            return Err(SignstreamError::DictionaryLoad {
                path: path.display().to_string(),
                message: "no usable words".to_string(),
            });
        }
        debug!(path = %path.display(), words = dictionary.len(), "loaded dictionary");
        Ok(dictionary)
    }

    /// The embedded word list, built on first use and shared process-wide.
    pub fn builtin() -> Arc<Dictionary> {
        Arc::clone(BUILTIN.get_or_init(|| Arc::new(Self::parse(BUILTIN_WORDS))))
    }

    /// The file at `path` if given, otherwise the builtin list.
    pub fn load(path: Option<&Path>) -> Result<Arc<Dictionary>> {
        match path {
            Some(path) => Ok(Arc::new(Self::from_file(path)?)),
            None => Ok(Self::builtin()),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in sorted order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Length in chars of the longest word (0 when empty).
    pub fn max_word_len(&self) -> usize {
        self.max_word_len
    }
}
