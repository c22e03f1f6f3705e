//! Overlapping sliding-window text chunker.
//!
//! Splits text into chunks of `chunk_size` characters stepping by
//! `chunk_size - overlap`, so consecutive chunks share exactly `overlap`
//! characters. Splitting is deterministic for identical input, operates on
//! char boundaries, and concatenating chunks minus their overlaps
//! reconstructs the original text losslessly.

use rand::Rng;

const ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Short random chunk identifier (12 lowercase alphanumerics).
pub fn chunk_id() -> String {
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| ID_CHARS[rng.gen_range(0..ID_CHARS.len())] as char)
        .collect()
}

/// Split `text` into overlapping chunks. `overlap` must be smaller than
/// `chunk_size`; empty input yields no chunks.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    debug_assert!(overlap < chunk_size, "overlap must be smaller than chunk size");
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offsets of every char boundary, including the end of the text.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let char_count = boundaries.len() - 1;

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(char_count);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == char_count {
            break;
        }
        start += step;
    }
    chunks
}

/// Expected chunk count for a text of `char_count` characters.
pub fn expected_chunk_count(char_count: usize, chunk_size: usize, overlap: usize) -> usize {
    if char_count == 0 {
        return 0;
    }
    if char_count <= chunk_size {
        return 1;
    }
    let step = chunk_size - overlap;
    1 + (char_count - chunk_size).div_ceil(step)
}
