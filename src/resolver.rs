//! Match resolution for a single parsed line.

use tracing::{debug, warn};

use crate::config::PAGE_SIZE;
use crate::models::{Candidate, MatchQuery, RejectReason, ResolutionResult, ScoredCandidate};
use crate::provider::{SearchError, SearchProvider, SearchRequest};
use crate::scoring::evaluate;

/// Searches the injected provider and picks the best candidate for a query.
pub struct MatchResolver<P> {
    provider: P,
    page_size: usize,
}

/// Highest-confidence candidate; on ties the earliest in catalog order wins.
pub fn select_best(query: &MatchQuery, candidates: &[Candidate]) -> Option<ScoredCandidate> {
    let mut best: Option<ScoredCandidate> = None;
    for candidate in candidates {
        let scored = evaluate(query, candidate);
        debug!(
            candidate = %candidate.summary(),
            confidence = scored.confidence,
            title_score = scored.breakdown.title_score,
            album_score = scored.breakdown.album_score,
            gate = scored.breakdown.artist_gate_passed,
            "scored candidate"
        );
        if best.as_ref().map_or(true, |b| scored.confidence > b.confidence) {
            best = Some(scored);
        }
    }
    best
}

impl<P: SearchProvider> MatchResolver<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resolve one query against the catalog.
    ///
    /// Non-fatal provider errors become a `Rejected` result so the caller can
    /// move on to the next line. Fatal errors (bad credentials) are returned.
    pub fn resolve(&self, query: &MatchQuery, threshold: f64) -> Result<ResolutionResult, SearchError> {
        let candidates = match self.search(query) {
            Ok(candidates) => candidates,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(line = %query.raw, error = %e, "search failed");
                return Ok(ResolutionResult::Rejected {
                    query: query.clone(),
                    best: None,
                    best_confidence: 0.0,
                    reason: RejectReason::ProviderError(e.to_string()),
                });
            }
        };

        let Some(best) = select_best(query, &candidates) else {
            return Ok(ResolutionResult::Rejected {
                query: query.clone(),
                best: None,
                best_confidence: 0.0,
                reason: RejectReason::NoCandidates,
            });
        };

        if best.confidence >= threshold {
            Ok(ResolutionResult::Accepted {
                id: best.candidate.id,
                confidence: best.confidence,
            })
        } else {
            Ok(ResolutionResult::Rejected {
                query: query.clone(),
                best: Some(best.candidate.summary()),
                best_confidence: best.confidence,
                reason: RejectReason::BelowThreshold { threshold },
            })
        }
    }

    /// Search with the album filter first, widening to artist + title when
    /// the album-filtered search finds nothing.
    fn search(&self, query: &MatchQuery) -> Result<Vec<Candidate>, SearchError> {
        let request = SearchRequest::for_query(query, self.page_size);
        let mut candidates = self.provider.search(&request)?;

        if candidates.is_empty() {
            if let Some(widened) = request.without_album() {
                debug!(line = %query.raw, "no results with album filter, retrying without");
                candidates = self.provider.search(&widened)?;
            }
        }

        candidates.truncate(self.page_size);
        Ok(candidates)
    }
}
