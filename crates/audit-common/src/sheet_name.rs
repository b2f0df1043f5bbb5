//! Excel sheet-name sanitizer.
//!
//! The external tabular writer requires names that are at most 31 chars,
//! contain none of `\ / ? * [ ] :`, and do not start or end with `'`.
//! [`sanitize`] is pure and idempotent; uniqueness across a whole load is
//! the loader's job ([`dedupe`]).

const MAX_LEN: usize = 31;
const FORBIDDEN: [char; 6] = ['\\', '/', '?', '*', '[', ']'];

/// Sanitize a candidate sheet name: replace forbidden characters, trim
/// leading/trailing whitespace and single quotes, then truncate to 31
/// characters. Running this on an already-sanitized name is a no-op.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c == ':' { '_' } else { c })
        .collect();
    let trimmed = replaced.trim().trim_matches('\'').trim();
    let mut truncated: String = trimmed.chars().take(MAX_LEN).collect();
    // Truncation could re-expose a trailing quote or whitespace; trim once more.
    while truncated.ends_with('\'') || truncated.ends_with(char::is_whitespace) {
        truncated.pop();
    }
    if truncated.is_empty() {
        "sheet".to_string()
    } else {
        truncated
    }
}

/// Resolve `candidate` to a name unique within `used`, suffixing `_2`,
/// `_3`, … on collision, and recording the chosen name in `used`.
pub fn dedupe(candidate: &str, used: &mut std::collections::HashSet<String>) -> String {
    if used.insert(candidate.to_string()) {
        return candidate.to_string();
    }
    let mut n = 2usize;
    loop {
        let suffix = format!("_{n}");
        let base_len = MAX_LEN.saturating_sub(suffix.len());
        let base: String = candidate.chars().take(base_len).collect();
        let attempt = format!("{base}{suffix}");
        if used.insert(attempt.clone()) {
            return attempt;
        }
        n += 1;
    }
}
