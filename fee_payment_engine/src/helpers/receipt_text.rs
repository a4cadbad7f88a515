use once_cell::sync::Lazy;
use regex::Regex;

static NOT_REFERENCE_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9]").expect("static regex"));
static NOT_NAME_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9*]").expect("static regex"));

/// Reduces a payment reference number to its upper-case alphanumeric characters, so that `1234 567 890` and
/// `1234-567-890` compare equal. Returns `None` when nothing is left.
pub fn normalize_reference(reference: &str) -> Option<String> {
    let upper = reference.to_uppercase();
    let normalized = NOT_REFERENCE_CHAR.replace_all(&upper, "").into_owned();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn normalize_name(name: &str) -> Vec<char> {
    let upper = name.to_uppercase();
    NOT_NAME_CHAR.replace_all(&upper, "").chars().collect()
}

/// Similarity between a receiver name read off a receipt and the expected receiver, from 0.0 to 1.0.
///
/// Comparison ignores case, whitespace and punctuation. Wallet receipts mask parts of the receiver name with `*`, so
/// an asterisk on either side matches any single character.
pub fn receiver_similarity(extracted: &str, expected: &str) -> f64 {
    let a = normalize_name(extracted);
    let b = normalize_name(expected);
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = masked_levenshtein(&a, &b);
    1.0 - distance as f64 / longest as f64
}

fn masked_levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let same = ca == cb || *ca == '*' || *cb == '*';
            let substitution = prev[j] + usize::from(!same);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
