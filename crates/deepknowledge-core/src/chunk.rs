//! Paragraph-boundary text splitter.
//!
//! Used twice in the pipeline: the loader splits extracted documents into
//! records, and the store splits every record into passages before
//! embedding. Both use the same `max_tokens` budget so a document chunk is
//! never split a second time.
//!
//! # Algorithm
//!
//! 1. Convert `max_tokens` to `max_chars` using a 4 chars/token ratio.
//! 2. Split on blank lines (`\n\n`) and drop empty paragraphs.
//! 3. Pack paragraphs into the current piece while it fits.
//! 4. A paragraph longer than `max_chars` on its own is hard-split at the
//!    last newline or space before the limit (or at the limit itself).
//!
//! ```rust
//! use deepknowledge_core::chunk::split_text;
//!
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", 700);
//! assert_eq!(pieces, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

use sha2::{Digest, Sha256};

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split `text` into pieces of at most `max_tokens × 4` bytes.
///
/// Returns an empty vector for blank input. Pieces are trimmed and never
/// empty; concatenation order follows the source text.
pub fn split_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN).max(1);
    let mut pieces = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let needed = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len()
        };
        if needed <= max_chars {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(para);
            continue;
        }

        if !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
        }
        if para.len() <= max_chars {
            buf.push_str(para);
        } else {
            hard_split(para, max_chars, &mut pieces);
        }
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }
    pieces
}

/// Break one oversized paragraph at whitespace near `max_chars`.
fn hard_split(mut rest: &str, max_chars: usize, out: &mut Vec<String>) {
    while !rest.is_empty() {
        if rest.len() <= max_chars {
            push_trimmed(rest, out);
            break;
        }
        let limit = floor_char_boundary(rest, max_chars);
        let cut = rest[..limit]
            .rfind(|c: char| c == '\n' || c == ' ')
            .map(|pos| pos + 1)
            .unwrap_or(limit);
        // A leading multi-byte char wider than the limit still has to move forward.
        let cut = if cut == 0 {
            rest.chars().next().map(char::len_utf8).unwrap_or(rest.len())
        } else {
            cut
        };
        push_trimmed(&rest[..cut], out);
        rest = &rest[cut..];
    }
}

fn push_trimmed(piece: &str, out: &mut Vec<String>) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// SHA-256 hex digest of a passage, used to reuse vectors across rebuilds.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
