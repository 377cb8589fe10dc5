use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Widest chunk a single bit-parallel pass can handle.
pub const MAX_CHUNK_LEN: usize = 64;

/// Lowercase `text` and strip diacritics (compatibility decomposition, combining marks dropped).
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Per-character match masks for one chunk of a pattern.
struct Chunk {
    len: usize,
    ascii: [u64; 128],
    other: HashMap<char, u64>,
}

impl Chunk {
    fn new(chars: &[char]) -> Self {
        let mut ascii = [0u64; 128];
        let mut other = HashMap::new();
        for (i, &c) in chars.iter().enumerate() {
            let bit = 1u64 << i;
            if c.is_ascii() {
                ascii[c as usize] |= bit;
            } else {
                *other.entry(c).or_insert(0) |= bit;
            }
        }
        Self { len: chars.len(), ascii, other }
    }

    #[inline]
    fn mask(&self, c: char) -> u64 {
        if c.is_ascii() {
            self.ascii[c as usize]
        } else {
            self.other.get(&c).copied().unwrap_or(0)
        }
    }

    /// Smallest edit distance between this chunk and any substring of `text`
    /// (Myers' bit-vector approximate search; the match may start anywhere).
    fn distance(&self, text: &[char]) -> usize {
        let last = 1u64 << (self.len - 1);
        let mut pv = !0u64;
        let mut mv = 0u64;
        let mut score = self.len;
        let mut best = self.len;
        for &c in text {
            let eq = self.mask(c);
            let xv = eq | mv;
            let xh = ((eq & pv).wrapping_add(pv) ^ pv) | eq;
            let mut ph = mv | !(xh | pv);
            let mut mh = pv & xh;
            if ph & last != 0 {
                score += 1;
            } else if mh & last != 0 {
                score -= 1;
            }
            ph <<= 1;
            mh <<= 1;
            pv = mh | !(xv | ph);
            mv = ph & xv;
            if score < best {
                best = score;
                if best == 0 {
                    break;
                }
            }
        }
        best
    }
}

/// A folded search term compiled for approximate matching.
///
/// Terms longer than the chunk width are cut into nearly equal chunks, each
/// matched independently against the text.
pub struct Pattern {
    term: String,
    chunks: Vec<Chunk>,
}

impl Pattern {
    pub fn new(term: &str, max_chunk_len: usize) -> Self {
        let term = fold(term);
        let chars: Vec<char> = term.chars().collect();
        let width = max_chunk_len.clamp(1, MAX_CHUNK_LEN);
        let chunks = if chars.is_empty() {
            Vec::new()
        } else {
            let count = chars.len().div_ceil(width);
            let size = chars.len().div_ceil(count);
            chars.chunks(size).map(Chunk::new).collect()
        };
        Self { term, chunks }
    }

    /// The folded term this pattern was built from.
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Mean error ratio (edits / chunk length) of the pattern's best placement in `text`,
    /// or `None` when no chunk reaches `threshold`. `text` must already be folded.
    pub fn score(&self, text: &[char], threshold: f64) -> Option<f64> {
        if self.chunks.is_empty() {
            return None;
        }
        let mut total = 0.0;
        let mut matched = false;
        for chunk in &self.chunks {
            let ratio = chunk.distance(text) as f64 / chunk.len as f64;
            matched |= ratio <= threshold;
            total += ratio;
        }
        matched.then(|| total / self.chunks.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        fold(s).chars().collect()
    }

    #[test]
    fn folds_case_and_diacritics() {
        assert_eq!(fold("Café RÉSUMÉ"), "cafe resume");
        assert_eq!(fold("Ｒｕｓｔ"), "rust");
    }

    #[test]
    fn exact_substring_scores_zero() {
        let p = Pattern::new("Engineer", 32);
        assert_eq!(p.score(&chars("senior backend engineer"), 0.6), Some(0.0));
    }

    #[test]
    fn one_typo_is_one_edit() {
        let p = Pattern::new("kubernetes", 32);
        let score = p.score(&chars("deployed on kubernets clusters"), 0.6).unwrap();
        assert!((score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn threshold_rejects_distant_terms() {
        let p = Pattern::new("javascript", 32);
        assert_eq!(p.score(&chars("rust go"), 0.3), None);
    }

    #[test]
    fn long_terms_are_chunked_evenly() {
        let p = Pattern::new(&"a".repeat(70), 32);
        let sizes: Vec<usize> = p.chunks.iter().map(|c| c.len).collect();
        assert_eq!(sizes, vec![24, 24, 22]);
        let q = Pattern::new(&"b".repeat(64), 64);
        assert_eq!(q.chunks.len(), 1);
        assert_eq!(q.score(&chars(&"b".repeat(64)), 0.0), Some(0.0));
    }

    #[test]
    fn empty_term_never_matches() {
        let p = Pattern::new("", 32);
        assert!(p.is_empty());
        assert_eq!(p.score(&chars("anything"), 1.0), None);
    }

    #[test]
    fn empty_text_is_all_errors() {
        let p = Pattern::new("go", 32);
        assert_eq!(p.score(&[], 1.0), Some(1.0));
        assert_eq!(p.score(&[], 0.6), None);
    }
}
