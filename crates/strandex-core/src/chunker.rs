//! Fixed-window text chunking.
//!
//! Long documents are split into contiguous, non-overlapping windows of at
//! most `chunk_size` characters before being handed to the backend. Windows
//! never look at sentence or paragraph boundaries, so a split may fall in
//! the middle of a word. Each window is trimmed and dropped if nothing is
//! left; the cursor always advances by the untrimmed window length.

use std::ops::Range;

use crate::error::Error;

/// Default window length in characters (not tokens).
pub const DEFAULT_CHUNK_SIZE: usize = 3000;

/// Byte ranges of the untrimmed windows covering `text`.
///
/// The ranges are contiguous, start at 0 and end at `text.len()`. Every
/// range holds `chunk_size` characters except possibly the last one.
pub fn chunk_bounds(text: &str, chunk_size: usize) -> Result<Vec<Range<usize>>, Error> {
    if chunk_size == 0 {
        return Err(Error::InvalidChunkSize(chunk_size));
    }

    let mut bounds = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == chunk_size {
            bounds.push(start..idx);
            start = idx;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        bounds.push(start..text.len());
    }

    Ok(bounds)
}

/// Split `text` into ordered, trimmed, non-empty chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Result<Vec<String>, Error> {
    let chunks = chunk_bounds(text, chunk_size)?
        .into_iter()
        .map(|range| text[range].trim())
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect();
    Ok(chunks)
}
