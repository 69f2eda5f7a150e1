use std::cmp::Ordering;

use regex::Regex;

/// Compare two dot-separated version strings component by component.
///
/// Components are compared numerically; a missing component counts as `0`,
/// so `1.7` equals `1.7.0`. A component's value is its leading digits, which
/// keeps suffixes such as `1.8.0rc1` or `5.0.10r104061` comparable.
pub fn compare(a: &str, b: &str) -> Ordering {
    let left: Vec<u64> = components(a);
    let right: Vec<u64> = components(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn components(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Apply `pattern` to `text` and return capture group 1.
pub fn extract(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether `found` satisfies the minimum version `required`.
pub fn satisfies(found: &str, required: &str) -> bool {
    compare(found, required) != Ordering::Less
}
