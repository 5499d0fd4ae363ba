//! Name similarity used to guess which V1 function a new V2 function replaces.
//!
//! The ratio is the Ratcliff/Obershelp "gestalt" score: twice the number of
//! characters in matching blocks divided by the total length of both strings.
//! Matching blocks are found by taking the longest common substring and
//! recursing on the pieces to its left and right.

/// Names are considered similar when their ratio is strictly above this value.
pub const SIMILARITY_THRESHOLD: f64 = 0.90;

/// Similarity ratio in `[0, 1]`. Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Case-insensitive similarity test against [`SIMILARITY_THRESHOLD`].
pub fn similar(a: &str, b: &str) -> bool {
    ratio(&a.to_lowercase(), &b.to_lowercase()) > SIMILARITY_THRESHOLD
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_match(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Longest common substring as `(start_a, start_b, len)`. Ties go to the block
/// starting earliest in `a`, then earliest in `b`.
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                cur[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = cur;
    }
    best
}
