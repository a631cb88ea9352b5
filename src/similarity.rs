//! Normalized string similarity (Ratcliff/Obershelp gestalt matching).
//!
//! The ratio is `2·M / (|a| + |b|)` where `M` is the number of characters in
//! matching blocks: the longest common block is found, then the search
//! recurses into the unmatched text on both sides of it. Comparison is
//! case-insensitive and counts Unicode scalar values, not bytes.

/// Similarity above which two commands count as "the same".
///
/// Shared by the context tracker, interaction memory, and response cache.
pub const SAME_THRESHOLD: f64 = 0.8;

/// Similarity ratio of two strings in `[0.0, 1.0]`.
///
/// Two empty strings are identical (`1.0`). The inputs are put into a
/// canonical order before matching, so `similarity(a, b) == similarity(b, a)`
/// holds exactly even when several longest blocks tie.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let (first, second) = if a <= b { (&a, &b) } else { (&b, &a) };
    let matched = matching_chars(first, second);
    (2 * matched) as f64 / total as f64
}

/// Whether two strings are similar enough to be treated as the same command.
pub fn is_same(a: &str, b: &str) -> bool {
    similarity(a, b) > SAME_THRESHOLD
}

/// Total length of all matching blocks between `a` and `b`.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    // Work list of (a_lo, a_hi, b_lo, b_hi) windows still to be matched.
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, len) = longest_block(&a[a_lo..a_hi], &b[b_lo..b_hi]);
        if len == 0 {
            continue;
        }
        matched += len;
        let (i, j) = (a_lo + i, b_lo + j);

        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + len < a_hi && j + len < b_hi {
            pending.push((i + len, a_hi, j + len, b_hi));
        }
    }

    matched
}

/// Longest common contiguous block as `(start_in_a, start_in_b, len)`.
///
/// Ties resolve to the earliest start in `a`, then the earliest in `b`.
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    if a.is_empty() || b.is_empty() {
        return best;
    }

    // prev[j + 1] = length of the common suffix ending at a[i - 1], b[j].
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = curr[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}
