//! Catalog search providers.
//!
//! The resolver only sees the [`SearchProvider`] trait. Two implementations
//! ship with the crate: the Spotify Web API client and a local SQLite FTS
//! catalog built by `index-catalog`.

pub mod catalog;
pub mod spotify;

use thiserror::Error;

use crate::models::{Candidate, MatchQuery};

/// Field filters for providers that support structured search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredFilter {
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
}

/// One search call: free text always, structured filters when the query has them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub text: String,
    pub filter: Option<StructuredFilter>,
    pub limit: usize,
}

impl SearchRequest {
    /// Build the request for a parsed line.
    ///
    /// The structured filter uses the first credited artist and is only set
    /// when both artist and title are present.
    pub fn for_query(query: &MatchQuery, limit: usize) -> Self {
        let mut text = query.artists.join(" ");
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&query.title);

        let filter = query.artists.first().and_then(|artist| {
            (!query.title.is_empty()).then(|| StructuredFilter {
                artist: artist.clone(),
                title: query.title.clone(),
                album: query.album.clone(),
            })
        });

        Self {
            text,
            filter,
            limit,
        }
    }

    /// Same request with the album filter dropped, if there was one to drop.
    pub fn without_album(&self) -> Option<Self> {
        let filter = self.filter.as_ref()?;
        filter.album.as_ref()?;
        Some(Self {
            text: self.text.clone(),
            filter: Some(StructuredFilter {
                album: None,
                ..filter.clone()
            }),
            limit: self.limit,
        })
    }
}

/// Errors a provider may report. Only [`SearchError::is_fatal`] errors stop a batch.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("search API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid search response: {0}")]
    InvalidResponse(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("{count} consecutive search failures, last: {last}")]
    RepeatedFailures { count: usize, last: String },
}

impl SearchError {
    /// Errors that will fail for every following line too.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SearchError::Unauthorized(_) | SearchError::RepeatedFailures { .. }
        )
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(e: rusqlite::Error) -> Self {
        SearchError::Catalog(e.to_string())
    }
}

/// A remote or local catalog that can be searched for tracks.
///
/// Results are returned in catalog rank order, bounded by `request.limit`.
pub trait SearchProvider: Send + Sync {
    fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError>;
}

impl<P: SearchProvider + ?Sized> SearchProvider for Box<P> {
    fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        (**self).search(request)
    }
}

impl<P: SearchProvider + ?Sized> SearchProvider for &P {
    fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        (**self).search(request)
    }
}
