//! Overlapping text segmentation.
//!
//! Two splitters produce [`Chunk`]s from extracted document text:
//!
//! - [`segment`]: a fixed sliding window. The window start advances by
//!   `chunk_size - overlap` until it reaches the end of the text; the last
//!   chunk is whatever remains.
//! - [`segment_on_boundaries`]: the same window, but each cut is pulled back
//!   to the nearest paragraph, line, sentence, or word boundary found in a
//!   short look-back region before the `chunk_size` mark. It falls back to a
//!   hard cut when no boundary exists there.
//!
//! All sizes and offsets are counted in characters, never bytes, so
//! multi-byte text is never cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use mindforge_core::segment::segment;
//!
//! let text = "a".repeat(4500);
//! let chunks = segment(&text, 2000, 200).unwrap();
//! let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
//! assert_eq!(offsets, vec![0, 1800, 3600]);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Chunk;

/// Invalid segmentation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,
    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    InvalidOverlap { chunk_size: usize, overlap: usize },
}

/// Which splitter to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStrategy {
    /// Plain sliding window. Used for pasted text and transcripts.
    Fixed,
    /// Boundary-aware window. Used for uploaded files.
    Boundary,
}

impl SegmentStrategy {
    pub fn segment(
        self,
        text: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Vec<Chunk>, SegmentError> {
        match self {
            SegmentStrategy::Fixed => segment(text, chunk_size, overlap),
            SegmentStrategy::Boundary => segment_on_boundaries(text, chunk_size, overlap),
        }
    }
}

fn validate(chunk_size: usize, overlap: usize) -> Result<(), SegmentError> {
    if chunk_size == 0 {
        return Err(SegmentError::ZeroChunkSize);
    }
    if overlap >= chunk_size {
        return Err(SegmentError::InvalidOverlap {
            chunk_size,
            overlap,
        });
    }
    Ok(())
}

/// Byte offset of every char start, plus `text.len()` as a sentinel.
fn char_bounds(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// Split `text` with a fixed sliding window.
///
/// # Guarantees
///
/// - Empty text yields no chunks.
/// - Every chunk is at most `chunk_size` characters.
/// - Chunk `i` starts at character `i * (chunk_size - overlap)`.
/// - Only the final chunk may be shorter than `chunk_size`.
pub fn segment(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>, SegmentError> {
    validate(chunk_size, overlap)?;

    let bounds = char_bounds(text);
    let n = bounds.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < n {
        let end = (start + chunk_size).min(n);
        chunks.push(Chunk::new(
            chunks.len(),
            start,
            &text[bounds[start]..bounds[end]],
        ));
        start += step;
    }
    Ok(chunks)
}

/// Split `text` preferring natural boundaries near the `chunk_size` mark.
///
/// The look-back region is the last `chunk_size / 5` characters of the
/// window (at least one), never reaching below `start + overlap + 1` so
/// each step makes progress. Break preference, highest first: blank line,
/// line break, sentence end (`.`, `!`, `?` before whitespace), any
/// whitespace. Without a boundary the cut is hard at `chunk_size`.
///
/// The next chunk starts `overlap` characters before the cut, nudged
/// forward to the next word start so the overlap never begins mid-word.
///
/// # Guarantees
///
/// - Every chunk is at most `chunk_size` characters.
/// - Consecutive chunks share at most `overlap` characters.
/// - Every character of `text` falls in at least one chunk.
pub fn segment_on_boundaries(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, SegmentError> {
    validate(chunk_size, overlap)?;

    let chars: Vec<char> = text.chars().collect();
    let bounds = char_bounds(text);
    let n = chars.len();
    let lookback = (chunk_size / 5).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < n {
        let hard_end = (start + chunk_size).min(n);
        let end = if hard_end == n {
            n
        } else {
            let floor = (start + overlap + 1).max(hard_end.saturating_sub(lookback));
            find_break(&chars, floor, hard_end)
        };

        chunks.push(Chunk::new(
            chunks.len(),
            start,
            &text[bounds[start]..bounds[end]],
        ));

        if end >= n {
            break;
        }
        start = next_start(&chars, end, overlap);
    }
    Ok(chunks)
}

/// Pick a cut in `[floor, hard_end]`. The chunk is `[start, cut)`.
///
/// Requires `hard_end < chars.len()`.
fn find_break(chars: &[char], floor: usize, hard_end: usize) -> usize {
    if floor > hard_end {
        return hard_end;
    }

    let paragraph = |cut: usize| cut >= 2 && chars[cut - 1] == '\n' && chars[cut - 2] == '\n';
    let line = |cut: usize| chars[cut - 1] == '\n';
    let sentence =
        |cut: usize| matches!(chars[cut - 1], '.' | '!' | '?') && chars[cut].is_whitespace();
    let word = |cut: usize| chars[cut - 1].is_whitespace() || chars[cut].is_whitespace();

    let rules: [&dyn Fn(usize) -> bool; 4] = [&paragraph, &line, &sentence, &word];
    for rule in rules {
        if let Some(cut) = (floor..=hard_end).rev().find(|&cut| rule(cut)) {
            return cut;
        }
    }
    hard_end
}

/// Start of the chunk after a cut at `end`.
///
/// Unbroken runs with no word start in the overlap keep the full overlap.
fn next_start(chars: &[char], end: usize, overlap: usize) -> usize {
    let floor = end - overlap;
    let mut s = floor;
    while s < end && s > 0 && !chars[s - 1].is_whitespace() && !chars[s].is_whitespace() {
        s += 1;
    }
    if s == end && overlap > 0 && !chars[end - 1].is_whitespace() && !chars[end].is_whitespace() {
        return floor;
    }
    s
}
