//! Sentence-aware overlapping text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! with `overlap` characters shared between consecutive chunks to preserve
//! context across boundaries. Each window is cut at the latest natural break
//! (sentence end, blank line, newline, space) found in its second half, so
//! chunks preferentially end where the prose does.
//!
//! Offsets are character positions into the trimmed input text. Chunk ids
//! are deterministic: `{document_id}_{ordinal}`.

use crate::models::Chunk;

/// Break candidates searched backward from the window end, in priority
/// order. The first separator with any occurrence in the search region wins.
const SEPARATORS: [&str; 5] = [". ", ".\n", "\n\n", "\n", " "];

/// Split text into overlapping chunks. Returns an empty vec for
/// empty or whitespace-only input; callers treat that as "no extractable
/// content", not an error.
pub fn chunk_text(document_id: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.trim().chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    if total == 0 || chunk_size == 0 {
        return chunks;
    }

    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    while start < total {
        let mut end = (start + chunk_size).min(total);

        // Windows short of end-of-text get cut at a natural break, searched
        // backward from the raw boundary no further than the window midpoint.
        if end < total {
            let floor = start + chunk_size / 2;
            for sep in SEPARATORS {
                let sep_chars: Vec<char> = sep.chars().collect();
                if let Some(pos) = rfind_chars(&chars, &sep_chars, floor, end) {
                    end = pos + sep_chars.len();
                    break;
                }
            }
        }

        let content: String = chars[start..end].iter().collect();
        let content = content.trim();

        if !content.is_empty() {
            chunks.push(Chunk {
                id: format!("{}_{}", document_id, chunk_index),
                document_id: document_id.to_string(),
                chunk_index,
                text: content.to_string(),
                start_char: start,
                end_char: end,
            });
            chunk_index += 1;
        }

        // Advance with overlap, clamped to strict progress so overlap >=
        // chunk_size cannot loop forever.
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Last occurrence of `sep` fully contained in `chars[lo..hi)`, if any.
fn rfind_chars(chars: &[char], sep: &[char], lo: usize, hi: usize) -> Option<usize> {
    if sep.is_empty() || sep.len() > hi.saturating_sub(lo) {
        return None;
    }
    let mut pos = hi - sep.len();
    loop {
        if chars[pos..pos + sep.len()] == *sep {
            return Some(pos);
        }
        if pos == lo {
            return None;
        }
        pos -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("doc1", "Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].id, "doc1_0");
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 13);
    }

    #[test]
    fn test_empty_and_whitespace_yield_no_chunks() {
        assert!(chunk_text("doc1", "", 1000, 200).is_empty());
        assert!(chunk_text("doc1", "   \n\t  \n", 1000, 200).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota kappa.";
        let a = chunk_text("doc1", text, 30, 10);
        let b = chunk_text("doc1", text, 30, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_indices_contiguous_from_zero() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc1", &text, 100, 20);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.id, format!("doc1_{}", i));
        }
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        // A ". " sits inside the second half of the first window; the cut
        // must land right after it, not at the raw 40-char boundary.
        let text = "The quick brown fox jumps over dogs. Then it ran away into the deep dark forest nearby.";
        let chunks = chunk_text("doc1", text, 40, 0);
        assert!(chunks[0].text.ends_with("dogs."));
        // end offset includes the separator itself
        assert_eq!(chunks[0].end_char, text.find(". ").unwrap() + 2);
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let text = "word ".repeat(200);
        let chunks = chunk_text("doc1", &text, 100, 20);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            // Next window starts exactly `overlap` characters before the
            // previous cut (clamped only in degenerate cases).
            assert_eq!(pair[1].start_char, pair[0].end_char - 20);
        }
    }

    #[test]
    fn test_offsets_cover_text_without_gaps() {
        let raw = "One two three. Four five six.\n\nSeven eight nine ten eleven twelve. Thirteen fourteen.";
        let chunks = chunk_text("doc1", raw, 30, 8);
        let trimmed: Vec<char> = raw.trim().chars().collect();

        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks.last().unwrap().end_char, trimmed.len());

        // Concatenating each chunk's window minus the overlapped prefix
        // reconstructs the trimmed input exactly.
        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for c in &chunks {
            let from = c.start_char.max(covered);
            rebuilt.extend(&trimmed[from..c.end_char]);
            covered = c.end_char;
        }
        assert_eq!(rebuilt, raw.trim());
    }

    #[test]
    fn test_pathological_overlap_terminates() {
        // overlap >= chunk_size would stall the window without the clamp;
        // it must instead degrade to back-to-back windows.
        let text = "abcdefghij".repeat(10);
        let chunks = chunk_text("doc1", &text, 10, 10);
        assert_eq!(chunks.len(), 10);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_char, pair[0].end_char);
        }
    }

    #[test]
    fn test_trailing_partial_chunk_kept() {
        let text = "aaaa aaaa aaaa aaaa bb";
        let chunks = chunk_text("doc1", text, 20, 0);
        assert!(chunks.len() >= 2);
        let last = chunks.last().unwrap();
        assert!(last.text.len() < 20);
        assert!(last.text.ends_with("bb"));
    }

    #[test]
    fn test_multibyte_text_offsets_are_character_based() {
        let text = "héllo wörld. ".repeat(20);
        let chunks = chunk_text("doc1", &text, 50, 10);
        let trimmed: Vec<char> = text.trim().chars().collect();
        for c in &chunks {
            assert!(c.end_char <= trimmed.len());
            let window: String = trimmed[c.start_char..c.end_char].iter().collect();
            assert_eq!(window.trim(), c.text);
        }
    }
}
