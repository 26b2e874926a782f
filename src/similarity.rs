//! Case-insensitive string similarity on a 0.0 to 1.0 scale.

/// Normalized Levenshtein ratio between two strings, ignoring case.
///
/// Two empty strings are identical (1.0); an empty string against a non-empty
/// one scores 0.0. Strings with no characters in common also score 0.0, since
/// their edit distance equals the longer length.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    strsim::normalized_levenshtein(&a, &b).clamp(0.0, 1.0)
}
