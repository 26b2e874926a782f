//! Core data models for playlist reconciliation.
//!
//! Queries and candidates are value objects that live for one input line.
//! The report and stats types accumulate over one playlist.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Query & Candidate
// ============================================================================

/// One exported playlist line, decomposed into matchable fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchQuery {
    pub raw: String,          // Original line text, kept for diagnostics
    pub artists: Vec<String>, // Credited artists in line order (may be empty)
    pub title: String,        // Noise-stripped title, never empty for a non-blank line
    pub album: Option<String>,
}

/// One track returned by a catalog search.
///
/// Also the record format of the JSON-lines input to `index-catalog`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String, // Opaque catalog id (Spotify track id for the Web API provider)
    #[serde(default)]
    pub artists: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub album: Option<String>,
}

impl Candidate {
    /// Human-readable summary for diagnostics: "Artist A, Artist B - Title [Album] (id)"
    pub fn summary(&self) -> String {
        let mut s = String::new();
        if !self.artists.is_empty() {
            s.push_str(&self.artists.join(", "));
            s.push_str(" - ");
        }
        s.push_str(&self.title);
        if let Some(album) = self.album.as_deref().filter(|a| !a.is_empty()) {
            s.push_str(" [");
            s.push_str(album);
            s.push(']');
        }
        s.push_str(" (");
        s.push_str(&self.id);
        s.push(')');
        s
    }
}

// ============================================================================
// Scoring Models
// ============================================================================

/// Per-field scores behind a confidence value, on the 0-100 scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreBreakdown {
    pub artist_gate_passed: bool,
    pub title_score: f64,
    pub album_score: f64,
}

/// A candidate together with its confidence against one query.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub confidence: f64, // 0.0 to 1.0
    pub breakdown: ScoreBreakdown,
}

// ============================================================================
// Resolution
// ============================================================================

/// Why a line was not accepted.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    /// The catalog search returned nothing
    NoCandidates,
    /// The best candidate scored under the acceptance threshold
    BelowThreshold { threshold: f64 },
    /// The search call failed after the provider's own retries
    ProviderError(String),
}

/// Outcome of resolving one line. Every input line yields exactly one.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolutionResult {
    Accepted {
        id: String,
        confidence: f64,
    },
    Rejected {
        query: MatchQuery,
        best: Option<String>, // Summary of the best candidate seen, if any
        best_confidence: f64,
        reason: RejectReason,
    },
}

impl ResolutionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ResolutionResult::Accepted { .. })
    }

    pub fn confidence(&self) -> f64 {
        match self {
            ResolutionResult::Accepted { confidence, .. } => *confidence,
            ResolutionResult::Rejected { best_confidence, .. } => *best_confidence,
        }
    }

    /// Diagnostic text for a rejected line, `None` when accepted.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            ResolutionResult::Accepted { .. } => None,
            ResolutionResult::Rejected {
                best,
                best_confidence,
                reason,
                ..
            } => Some(match reason {
                RejectReason::NoCandidates => "no candidates found".to_string(),
                RejectReason::BelowThreshold { threshold } => format!(
                    "best match {} scored {:.2}, below threshold {:.2}",
                    best.as_deref().unwrap_or("<none>"),
                    best_confidence,
                    threshold
                ),
                RejectReason::ProviderError(e) => format!("Error: {}", e),
            }),
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// A line that did not make it into the destination playlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectedLine {
    pub line: String,
    pub diagnostic: String,
}

impl fmt::Display for RejectedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.line, self.diagnostic)
    }
}

/// Accumulated result of reconciling one playlist.
///
/// Invariant: `accepted.len() + rejected.len() + skipped.len() == total_lines`
/// once reconciliation finishes or aborts.
#[derive(Clone, Debug)]
pub struct ReconciliationReport {
    pub playlist: String,
    pub total_lines: usize,
    pub accepted: Vec<String>,       // Catalog ids in line order
    pub rejected: Vec<RejectedLine>, // Lines resolved without an accepted match
    pub skipped: Vec<String>,        // Lines never resolved because the run aborted
    pub stats: ReconcileStats,
}

impl ReconciliationReport {
    pub fn new(playlist: &str, total_lines: usize) -> Self {
        Self {
            playlist: playlist.to_string(),
            total_lines,
            accepted: Vec::new(),
            rejected: Vec::new(),
            skipped: Vec::new(),
            stats: ReconcileStats {
                playlist: playlist.to_string(),
                lines: total_lines,
                ..Default::default()
            },
        }
    }

    /// Number of lines that produced a resolution result
    pub fn processed(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    /// Append one resolved line, keeping stats in step.
    pub fn push(&mut self, line: &str, result: ResolutionResult) {
        self.stats.record(&result);
        match result {
            ResolutionResult::Accepted { id, .. } => self.accepted.push(id),
            rejected => {
                let diagnostic = rejected.diagnostic().unwrap_or_default();
                self.rejected.push(RejectedLine {
                    line: line.to_string(),
                    diagnostic,
                });
            }
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-playlist counts, serialized into the run stats file.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ReconcileStats {
    pub playlist: String,
    pub lines: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub no_candidates: usize,
    pub below_threshold: usize,
    pub provider_errors: usize,
    pub skipped: usize,
    pub elapsed_seconds: f64,
}

impl ReconcileStats {
    pub fn record(&mut self, result: &ResolutionResult) {
        match result {
            ResolutionResult::Accepted { .. } => self.accepted += 1,
            ResolutionResult::Rejected { reason, .. } => {
                self.rejected += 1;
                match reason {
                    RejectReason::NoCandidates => self.no_candidates += 1,
                    RejectReason::BelowThreshold { .. } => self.below_threshold += 1,
                    RejectReason::ProviderError(_) => self.provider_errors += 1,
                }
            }
        }
    }

    /// Accepted lines as a percentage of resolved lines
    pub fn match_rate(&self) -> f64 {
        let resolved = self.accepted + self.rejected;
        if resolved == 0 {
            0.0
        } else {
            100.0 * self.accepted as f64 / resolved as f64
        }
    }
}

/// Whole-run statistics across playlists.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    pub playlists: Vec<ReconcileStats>,
    pub total_lines: usize,
    pub total_accepted: usize,
    pub total_rejected: usize,
    pub total_skipped: usize,
    pub aborted: bool,
    pub elapsed_seconds: f64,
}

impl RunStats {
    pub fn add(&mut self, stats: ReconcileStats) {
        self.total_lines += stats.lines;
        self.total_accepted += stats.accepted;
        self.total_rejected += stats.rejected;
        self.total_skipped += stats.skipped;
        self.playlists.push(stats);
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: &str) -> MatchQuery {
        MatchQuery {
            raw: raw.to_string(),
            artists: vec![],
            title: raw.to_string(),
            album: None,
        }
    }

    #[test]
    fn test_candidate_summary() {
        let c = Candidate {
            id: "abc".to_string(),
            artists: vec!["Artist A".to_string(), "Artist B".to_string()],
            title: "Song".to_string(),
            album: Some("Album X".to_string()),
        };
        assert_eq!(c.summary(), "Artist A, Artist B - Song [Album X] (abc)");

        let bare = Candidate {
            id: "x".to_string(),
            artists: vec![],
            title: "Song".to_string(),
            album: None,
        };
        assert_eq!(bare.summary(), "Song (x)");
    }

    #[test]
    fn test_candidate_deserialize_defaults() {
        let c: Candidate = serde_json::from_str(r#"{"id":"1","title":"Song"}"#).unwrap();
        assert!(c.artists.is_empty());
        assert_eq!(c.album, None);
    }

    #[test]
    fn test_diagnostics() {
        let below = ResolutionResult::Rejected {
            query: query("A - Song"),
            best: Some("A - Song (1)".to_string()),
            best_confidence: 0.79,
            reason: RejectReason::BelowThreshold { threshold: 0.8 },
        };
        assert_eq!(
            below.diagnostic().unwrap(),
            "best match A - Song (1) scored 0.79, below threshold 0.80"
        );

        let error = ResolutionResult::Rejected {
            query: query("A - Song"),
            best: None,
            best_confidence: 0.0,
            reason: RejectReason::ProviderError("timeout".to_string()),
        };
        assert_eq!(error.diagnostic().unwrap(), "Error: timeout");

        let accepted = ResolutionResult::Accepted {
            id: "1".to_string(),
            confidence: 1.0,
        };
        assert_eq!(accepted.diagnostic(), None);
    }

    #[test]
    fn test_report_push_and_stats() {
        let mut report = ReconciliationReport::new("Road Trip", 3);
        report.push(
            "A - One",
            ResolutionResult::Accepted {
                id: "1".to_string(),
                confidence: 0.9,
            },
        );
        report.push(
            "B - Two",
            ResolutionResult::Rejected {
                query: query("B - Two"),
                best: None,
                best_confidence: 0.0,
                reason: RejectReason::NoCandidates,
            },
        );
        report.push(
            "C - Three",
            ResolutionResult::Rejected {
                query: query("C - Three"),
                best: None,
                best_confidence: 0.0,
                reason: RejectReason::ProviderError("boom".to_string()),
            },
        );

        assert_eq!(report.accepted, vec!["1".to_string()]);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].to_string(), "B - Two - no candidates found");
        assert_eq!(report.processed(), 3);
        assert_eq!(report.stats.no_candidates, 1);
        assert_eq!(report.stats.provider_errors, 1);
        assert!((report.stats.match_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_stats_totals() {
        let mut run = RunStats::default();
        let mut a = ReconcileStats {
            lines: 4,
            ..Default::default()
        };
        a.accepted = 3;
        a.rejected = 1;
        run.add(a);
        run.add(ReconcileStats {
            lines: 2,
            skipped: 2,
            ..Default::default()
        });
        assert_eq!(run.total_lines, 6);
        assert_eq!(run.total_accepted, 3);
        assert_eq!(run.total_skipped, 2);
        assert_eq!(run.playlists.len(), 2);
    }
}
