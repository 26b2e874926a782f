//! Shared normalization for query parsing and candidate scoring.
//!
//! Noise stripping removes video/audio/lyrics tags that exported playlist
//! lines carry but catalog entries do not. Artist keys are the folded form
//! compared by the artist gate.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Noise tags wrapped in brackets: "(Official Video)", "[Lyrics]", "(Audio)"
pub static BRACKETED_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*[\(\[]\s*(?:official\s+(?:music\s+|lyric\s+)?video|official\s+audio|lyric\s+video|visuali[sz]er|lyrics?|video|audio|official)\s*[\)\]]",
    )
    .unwrap()
});

/// Noise left outside brackets (applied in order).
pub static BARE_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Dash suffix: "Song - Official Audio", "Song | Lyric Video"
        Regex::new(r"(?i)\s*[-–—|]\s*(?:official\s+(?:music\s+|lyric\s+)?video|official\s+audio|lyric\s+video|lyrics?)\s*$").unwrap(),
        // Standalone words anywhere: "Song Official Video", "Song Lyrics"
        Regex::new(r"(?i)\b(?:official\s+(?:music\s+|lyric\s+)?video|official\s+audio|lyric\s+video|lyrics|video|audio|official)\b").unwrap(),
    ]
});

/// Brackets emptied by noise removal: "Song ()" → "Song"
pub static EMPTY_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(?:\(\s*\)|\[\s*\])").unwrap());

/// Separator left dangling at the end: "Song -" → "Song"
pub static TRAILING_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[-–—|:]+\s*$").unwrap());

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Transliterate whatever is left (Cyrillic, Greek, CJK)
    any_ascii(&stripped).to_lowercase()
}

/// Convert curly quotes to straight quotes and " & " to " and ", then collapse whitespace.
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{00B4}', '\u{0060}'], "'")
        .replace(" & ", " and ");
    MULTI_SPACE.replace_all(&result, " ").to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Strip video/audio/lyrics noise from a field.
///
/// Returns the trimmed input unchanged when stripping would leave nothing, so
/// a track literally called "Video" keeps its title.
pub fn strip_noise(text: &str) -> String {
    let mut result = BRACKETED_NOISE.replace_all(text, "").to_string();
    for pattern in BARE_NOISE.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }
    result = EMPTY_BRACKETS.replace_all(&result, "").to_string();
    result = TRAILING_SEPARATOR.replace(&result, "").to_string();
    let cleaned = MULTI_SPACE.replace_all(result.trim(), " ").to_string();

    if cleaned.is_empty() {
        MULTI_SPACE.replace_all(text.trim(), " ").to_string()
    } else {
        cleaned
    }
}

/// Key used to compare artist names for equality.
/// Case, diacritics, curly quotes and repeated whitespace are ignored.
pub fn artist_key(artist: &str) -> String {
    let punctuated = normalize_punctuation(artist.trim());
    let folded = fold_to_ascii(&punctuated);
    MULTI_SPACE.replace_all(folded.trim(), " ").to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_noise_bracketed() {
        assert_eq!(strip_noise("Song (Official Video)"), "Song");
        assert_eq!(strip_noise("Song [Official Music Video]"), "Song");
        assert_eq!(strip_noise("Song (Lyrics)"), "Song");
        assert_eq!(strip_noise("Song (AUDIO)"), "Song");
    }

    #[test]
    fn test_strip_noise_bare() {
        assert_eq!(strip_noise("Song - Official Audio"), "Song");
        assert_eq!(strip_noise("Song Lyrics"), "Song");
        assert_eq!(strip_noise("Song | Lyric Video"), "Song");
        assert_eq!(strip_noise("Song  official   video"), "Song");
    }

    #[test]
    fn test_strip_noise_keeps_real_words() {
        // Word boundaries protect names that merely contain a noise word
        assert_eq!(strip_noise("Audioslave"), "Audioslave");
        assert_eq!(strip_noise("Videotape"), "Videotape");
        assert_eq!(strip_noise("Under Pressure (Live)"), "Under Pressure (Live)");
    }

    #[test]
    fn test_strip_noise_never_empties() {
        assert_eq!(strip_noise("Video"), "Video");
        assert_eq!(strip_noise("  Official Audio "), "Official Audio");
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Motörhead"), "motorhead");
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize_punctuation("Don\u{2019}t Stop"), "Don't Stop");
        assert_eq!(normalize_punctuation("Simon & Garfunkel"), "Simon and Garfunkel");
        assert_eq!(normalize_punctuation("A  B"), "A B");
    }

    #[test]
    fn test_artist_key() {
        assert_eq!(artist_key("Daft Punk"), "daft punk");
        assert_eq!(artist_key("  DAFT   PUNK "), "daft punk");
        assert_eq!(artist_key("Sigur Rós"), artist_key("sigur ros"));
        assert_ne!(artist_key("The Beatles"), artist_key("Beatles"));
    }
}
