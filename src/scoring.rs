//! Candidate scoring.
//!
//! A candidate is scored against a parsed query in three steps:
//! - Artist gate (at least one shared artist, or no artists in the query)
//! - Title similarity, weighted twice
//! - Album similarity, pinned to full marks when the query has no album

use rustc_hash::FxHashSet;

use crate::models::{Candidate, MatchQuery, ScoreBreakdown, ScoredCandidate};
use crate::normalize::{artist_key, strip_noise};
use crate::similarity::similarity;

// ============================================================================
// Weights
// ============================================================================

/// Weight of the title score in the combined confidence
pub const TITLE_WEIGHT: f64 = 2.0;

/// Weight of the album score in the combined confidence
pub const ALBUM_WEIGHT: f64 = 1.0;

/// Score given to a field that matches perfectly (or is not constrained)
pub const FULL_SCORE: f64 = 100.0;

// ============================================================================
// Artist Gate
// ============================================================================

/// True when the query names no artists, or shares at least one artist with
/// the candidate (compared by [`artist_key`]).
pub fn artist_gate(query_artists: &[String], candidate_artists: &[String]) -> bool {
    if query_artists.is_empty() {
        return true;
    }

    let candidate_keys: FxHashSet<String> = candidate_artists
        .iter()
        .map(|a| artist_key(a))
        .filter(|k| !k.is_empty())
        .collect();

    query_artists
        .iter()
        .any(|a| candidate_keys.contains(&artist_key(a)))
}

// ============================================================================
// Combined Scoring
// ============================================================================

/// Score one candidate against a query.
///
/// Confidence is `(2 × title + album) / 3` on the 0-100 scale, mapped back to
/// 0.0-1.0. A failed artist gate short-circuits to zero without looking at
/// title or album.
pub fn evaluate(query: &MatchQuery, candidate: &Candidate) -> ScoredCandidate {
    if !artist_gate(&query.artists, &candidate.artists) {
        return ScoredCandidate {
            candidate: candidate.clone(),
            confidence: 0.0,
            breakdown: ScoreBreakdown {
                artist_gate_passed: false,
                title_score: 0.0,
                album_score: 0.0,
            },
        };
    }

    let title_score = similarity(&query.title, &strip_noise(&candidate.title)) * FULL_SCORE;

    let album_score = match &query.album {
        None => FULL_SCORE,
        Some(album) => {
            let candidate_album = candidate.album.as_deref().map(strip_noise).unwrap_or_default();
            similarity(album, &candidate_album) * FULL_SCORE
        }
    };

    let combined = (TITLE_WEIGHT * title_score + ALBUM_WEIGHT * album_score)
        / (TITLE_WEIGHT + ALBUM_WEIGHT);

    ScoredCandidate {
        candidate: candidate.clone(),
        confidence: (combined / FULL_SCORE).clamp(0.0, 1.0),
        breakdown: ScoreBreakdown {
            artist_gate_passed: true,
            title_score,
            album_score,
        },
    }
}
