//! Total order over migration names
//!
//! Plain string comparison puts `Migration1000` before `Migration999`. Names are
//! compared as alternating runs of digits and non-digits instead: digit runs by
//! numeric value, everything else lexically.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static NAME_CHUNKS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Static pattern
    Regex::new(r"[0-9]+|[^0-9]+").expect("valid name chunk pattern")
});

/// Compare two migration names in migration order
///
/// Digit runs compare by value, ignoring leading zeros; equal values with a
/// different number of leading zeros fall back to the shorter run first.
/// Names that tie on every chunk are ordered by plain string comparison, so
/// the result is a total order consistent with `==`.
///
/// ```rust
/// use std::cmp::Ordering;
/// use tidemark::migration::compare_names;
///
/// assert_eq!(compare_names("Migration999", "Migration1000"), Ordering::Less);
/// assert_eq!(compare_names("Migration1001", "Migration1000"), Ordering::Greater);
/// ```
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let mut left = NAME_CHUNKS.find_iter(a).map(|m| m.as_str());
    let mut right = NAME_CHUNKS.find_iter(b).map(|m| m.as_str());

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_chunk(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_chunk(l: &str, r: &str) -> Ordering {
    let l_digits = l.as_bytes()[0].is_ascii_digit();
    let r_digits = r.as_bytes()[0].is_ascii_digit();

    match (l_digits, r_digits) {
        (true, true) => {
            let l_trim = l.trim_start_matches('0');
            let r_trim = r.trim_start_matches('0');
            l_trim
                .len()
                .cmp(&r_trim.len())
                .then_with(|| l_trim.cmp(r_trim))
                .then_with(|| l.len().cmp(&r.len()))
        }
        // Digits sort before text, as they do in ASCII
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => l.cmp(r),
    }
}
