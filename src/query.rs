//! Parsing of exported playlist lines.
//!
//! Line format: `"<artists> - <title>"`, optionally followed by `" + <album>"`,
//! where `<artists>` is comma-separated. Both separators split on their first
//! occurrence only, so `"A - B - C"` yields artist `A` and title `B - C`.

use crate::models::MatchQuery;
use crate::normalize::strip_noise;

/// Separator between the artist list and the title
pub const ARTIST_SEPARATOR: &str = " - ";

/// Separator between the title and the album
pub const ALBUM_SEPARATOR: &str = " + ";

/// Decompose a raw line into a [`MatchQuery`].
///
/// Lines that do not split cleanly (no artist separator, empty artist list,
/// empty title) fall back to the whole line as title with no artists.
pub fn parse(raw_line: &str) -> MatchQuery {
    let raw = raw_line.trim();

    let Some((artist_part, rest)) = raw.split_once(ARTIST_SEPARATOR) else {
        return whole_line(raw);
    };

    let artists: Vec<String> = artist_part
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();

    let (title_part, album_part) = match rest.split_once(ALBUM_SEPARATOR) {
        Some((title, album)) => (title.trim(), Some(album.trim())),
        None => (rest.trim(), None),
    };

    if artists.is_empty() || title_part.is_empty() {
        return whole_line(raw);
    }

    MatchQuery {
        raw: raw.to_string(),
        artists,
        title: strip_noise(title_part),
        album: album_part.filter(|a| !a.is_empty()).map(strip_noise),
    }
}

fn whole_line(raw: &str) -> MatchQuery {
    MatchQuery {
        raw: raw.to_string(),
        artists: Vec::new(),
        title: strip_noise(raw),
        album: None,
    }
}
