//! Byte-level edit distance used by the plain-text comparator.
//!
//! Distances are computed over raw bytes, not Unicode scalar values, so a
//! multi-byte character that differs counts once per differing byte.

use strsim::generic_levenshtein;

/// Levenshtein distance between two byte strings.
pub fn levenshtein(a: &[u8], b: &[u8]) -> usize {
    generic_levenshtein(&a.to_vec(), &b.to_vec())
}

/// Similarity as an integer percentage, `floor(100 * (1 - distance / max_len))`.
///
/// Empty input on either side is 0; byte-equal inputs are 100 without running the distance.
pub fn similarity_percent(a: &[u8], b: &[u8]) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }

    let max_len = a.len().max(b.len());
    let distance = levenshtein(a, b);
    (100 * (max_len - distance) / max_len) as u8
}
