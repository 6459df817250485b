//! Completion suggestions for the unsegmented remainder.

use crate::defaults;
use crate::dictionary::Dictionary;
use std::cmp::Ordering;
use std::sync::Arc;

/// Ranker settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestionConfig {
    pub max_suggestions: usize,
    /// Non-prefix candidates must score strictly above this.
    pub min_similarity: f32,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_suggestions: defaults::MAX_SUGGESTIONS,
            min_similarity: defaults::MIN_SIMILARITY,
        }
    }
}

/// Compute Levenshtein edit distance between two strings.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Edit distance normalized into `[0, 1]`: `1 - distance / longer length`.
///
/// Two empty strings are identical (1.0).
pub fn similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f32 / longest as f32
}

struct Candidate<'a> {
    word: &'a str,
    prefix: bool,
    score: f32,
}

/// Ranks dictionary words as completions of a partial word.
#[derive(Debug, Clone)]
pub struct SuggestionRanker {
    dictionary: Arc<Dictionary>,
    config: SuggestionConfig,
}

impl SuggestionRanker {
    pub fn new(dictionary: Arc<Dictionary>, config: SuggestionConfig) -> Self {
        Self { dictionary, config }
    }

    /// Up to `max_suggestions` words for `remainder`, never more than
    /// [`defaults::MAX_SUGGESTIONS`].
    ///
    /// Words starting with the remainder come first, then by descending
    /// similarity; equal scores keep dictionary order.
    pub fn suggest(&self, remainder: &str) -> Vec<String> {
        let partial = remainder.trim().to_uppercase();
        let limit = self.config.max_suggestions.min(defaults::MAX_SUGGESTIONS);
        if partial.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<Candidate<'_>> = self
            .dictionary
            .words()
            .filter_map(|word| {
                let prefix = word.starts_with(&partial);
                let score = similarity(&partial, word);
                (prefix || score > self.config.min_similarity).then_some(Candidate {
                    word,
                    prefix,
                    score,
                })
            })
            .collect();

        // Stable sort: ties stay in dictionary order.
        candidates.sort_by(|a, b| {
            b.prefix
                .cmp(&a.prefix)
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        });

        candidates
            .into_iter()
            .take(limit)
            .map(|c| c.word.to_string())
            .collect()
    }

    pub fn config(&self) -> &SuggestionConfig {
        &self.config
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranker(words: &[&str]) -> SuggestionRanker {
        SuggestionRanker::new(
            Arc::new(Dictionary::from_words(words.iter().copied())),
            SuggestionConfig::default(),
        )
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("ABC", ""), 3);
        assert_eq!(edit_distance("", "ABC"), 3);
        assert_eq!(edit_distance("KITTEN", "SITTING"), 3);
        assert_eq!(edit_distance("GOO", "GOOD"), 1);
        assert_eq!(edit_distance("FLAW", "LAWN"), 2);
    }

    #[test]
    fn edit_distance_is_symmetric() {
        for (a, b) in [("HELLO", "HELP"), ("GOO", "GOODBYE"), ("A", "B")] {
            assert_eq!(edit_distance(a, b), edit_distance(b, a));
        }
    }

    #[test]
    fn similarity_is_normalized() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("GOOD", "GOOD"), 1.0);
        assert_eq!(similarity("ABC", "XYZ"), 0.0);
        assert!((similarity("GOO", "GOOD") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn prefix_matches_come_first() {
        let r = ranker(&["GOOD", "GOODBYE", "FOOD"]);
        let suggestions = r.suggest("GOO");
        assert_eq!(suggestions[..2], ["GOOD", "GOODBYE"]);
    }

    #[test]
    fn prefix_beats_higher_similarity() {
        // FOO scores 0.67 against GOO, GOODBYE only 0.43, but GOODBYE is a prefix match.
        let r = ranker(&["FOO", "GOODBYE"]);
        assert_eq!(r.suggest("GOO"), vec!["GOODBYE", "FOO"]);
    }

    #[test]
    fn non_prefix_ranked_by_similarity() {
        let r = ranker(&["HELP", "HELLO", "YELLOW"]);
        // HELLX: HELLO 0.8, HELP 0.6, YELLOW 0.5
        assert_eq!(r.suggest("HELLX"), vec!["HELLO", "HELP", "YELLOW"]);
    }

    #[test]
    fn never_more_than_three() {
        let r = ranker(&["GA", "GB", "GC", "GD", "GE", "GF"]);
        assert_eq!(r.suggest("G").len(), 3);
    }

    #[test]
    fn larger_configured_limit_is_capped() {
        let r = SuggestionRanker::new(
            Arc::new(Dictionary::from_words(["GA", "GB", "GC", "GD", "GE", "GF"])),
            SuggestionConfig {
                max_suggestions: 5,
                ..SuggestionConfig::default()
            },
        );
        assert_eq!(r.suggest("G"), vec!["GA", "GB", "GC"]);
    }

    #[test]
    fn smaller_configured_limit_is_honored() {
        let r = SuggestionRanker::new(
            Arc::new(Dictionary::from_words(["GA", "GB", "GC"])),
            SuggestionConfig {
                max_suggestions: 1,
                ..SuggestionConfig::default()
            },
        );
        assert_eq!(r.suggest("G"), vec!["GA"]);
    }

    #[test]
    fn equal_scores_keep_dictionary_order() {
        let r = ranker(&["GD", "GC", "GB", "GA"]);
        assert_eq!(r.suggest("G"), vec!["GA", "GB", "GC"]);
    }

    #[test]
    fn empty_remainder_has_no_suggestions() {
        let r = ranker(&["GOOD"]);
        assert!(r.suggest("").is_empty());
        assert!(r.suggest("   ").is_empty());
    }

    #[test]
    fn dissimilar_words_do_not_qualify() {
        let r = ranker(&["XYZ", "QRST"]);
        assert!(r.suggest("ABC").is_empty());
    }

    #[test]
    fn lowercase_input_is_uppercased() {
        let r = ranker(&["GOOD"]);
        assert_eq!(r.suggest("goo"), vec!["GOOD"]);
    }
}
