//! Word segmenter.
//!
//! Splits the letter buffer into the longest prefix that can be written as
//! a sequence of dictionary words, and hands back whatever is left over.

use crate::dictionary::Dictionary;
use serde::Serialize;
use std::iter;

/// Outcome of one segmentation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentationResult {
    /// Dictionary words covering the longest segmentable prefix, in order.
    pub settled_words: Vec<String>,
    /// Unsegmented tail of the buffer.
    pub remainder: String,
}

impl SegmentationResult {
    /// Settled words and remainder joined back into the original buffer.
    pub fn reassemble(&self) -> String {
        let mut out = self.settled_words.concat();
        out.push_str(&self.remainder);
        out
    }
}

/// Segments `buffer` against `dictionary`.
///
/// `reach[i]` records whether the first `i` letters split into words and
/// `back[i]` where the last of those words starts. At each end position the
/// smallest qualifying start wins, so alternative segmentations of the same
/// prefix resolve to the earliest breakpoint.
pub fn segment(buffer: &str, dictionary: &Dictionary) -> SegmentationResult {
    // Byte offset of every char boundary, so slices stay valid for any UTF-8.
    let bounds: Vec<usize> = buffer
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(iter::once(buffer.len()))
        .collect();
    let n = bounds.len() - 1;
    let longest = dictionary.max_word_len();

    let mut reach = vec![false; n + 1];
    let mut back = vec![0usize; n + 1];
    reach[0] = true;

    for i in 1..=n {
        // Words longer than the longest dictionary entry can never match.
        let first = i.saturating_sub(longest);
        for j in first..i {
            if reach[j] && dictionary.contains(&buffer[bounds[j]..bounds[i]]) {
                reach[i] = true;
                back[i] = j;
                break;
            }
        }
    }

    let end = (0..=n).rev().find(|&i| reach[i]).unwrap_or(0);

    let mut settled_words = Vec::new();
    let mut i = end;
    while i > 0 {
        let j = back[i];
        settled_words.push(buffer[bounds[j]..bounds[i]].to_string());
        i = j;
    }
    settled_words.reverse();

    SegmentationResult {
        settled_words,
        remainder: buffer[bounds[end]..].to_string(),
    }
}
