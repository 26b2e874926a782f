//! Spotify Web API track search.
//!
//! Uses a pre-issued bearer token (obtaining one is out of scope). Requests
//! are spaced by a minimum interval; 429 and 5xx responses are retried with
//! `Retry-After` or exponential backoff before surfacing as errors.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{SearchError, SearchProvider, SearchRequest};
use crate::models::Candidate;

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com";

/// Longest we are willing to sleep on a single Retry-After
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

/// Spotify caps search page size at 50
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct SpotifyOptions {
    pub api_base: String,
    pub market: Option<String>,
    pub max_retries: u32,
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl Default for SpotifyOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            market: None,
            max_retries: 3,
            min_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SpotifySearch {
    client: Client,
    token: String,
    options: SpotifyOptions,
    last_request: Mutex<Instant>,
}

// ============================================================================
// Response Shapes
// ============================================================================

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Option<TrackItem>>,
}

#[derive(Deserialize)]
struct TrackItem {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistItem>,
    album: Option<AlbumItem>,
}

#[derive(Deserialize)]
struct ArtistItem {
    name: Option<String>,
}

#[derive(Deserialize)]
struct AlbumItem {
    name: Option<String>,
}

impl TrackItem {
    /// Tracks without an id or name cannot be added to a playlist; drop them.
    fn into_candidate(self) -> Option<Candidate> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let title = self.name.filter(|n| !n.is_empty())?;
        Some(Candidate {
            id,
            artists: self.artists.into_iter().filter_map(|a| a.name).collect(),
            title,
            album: self.album.and_then(|a| a.name),
        })
    }
}

// ============================================================================
// Query Building & Decoding
// ============================================================================

fn field(name: &str, value: &str) -> String {
    format!("{}:\"{}\"", name, value.replace('"', ""))
}

/// Spotify `q` parameter: field filters when available, free text otherwise.
pub fn build_query(request: &SearchRequest) -> String {
    match &request.filter {
        Some(filter) => {
            let mut q = format!(
                "{} {}",
                field("track", &filter.title),
                field("artist", &filter.artist)
            );
            if let Some(album) = &filter.album {
                q.push(' ');
                q.push_str(&field("album", album));
            }
            q
        }
        None => request.text.clone(),
    }
}

/// Decode a search response body into candidates, in Spotify's result order.
pub fn decode_tracks(body: &str) -> Result<Vec<Candidate>, SearchError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
    let page = response
        .tracks
        .ok_or_else(|| SearchError::InvalidResponse("missing 'tracks' object".to_string()))?;

    let total = page.items.len();
    let candidates: Vec<Candidate> = page
        .items
        .into_iter()
        .flatten()
        .filter_map(TrackItem::into_candidate)
        .collect();
    if candidates.len() < total {
        debug!(dropped = total - candidates.len(), "dropped incomplete track items");
    }
    Ok(candidates)
}

/// Seconds from a `Retry-After` header, if present and numeric.
pub fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1u64 << attempt.min(6)))
}

// ============================================================================
// Client
// ============================================================================

impl SpotifySearch {
    pub fn new(token: String, options: SpotifyOptions) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("playlist-reconcile/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            client,
            token,
            last_request: Mutex::new(
                Instant::now()
                    .checked_sub(options.min_interval)
                    .unwrap_or_else(Instant::now),
            ),
            options,
        })
    }

    fn rate_limit(&self) {
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let elapsed = last.elapsed();
        if elapsed < self.options.min_interval {
            std::thread::sleep(self.options.min_interval - elapsed);
        }
        *last = Instant::now();
    }

    fn search_url(&self) -> String {
        format!("{}/v1/search", self.options.api_base.trim_end_matches('/'))
    }
}

impl SearchProvider for SpotifySearch {
    fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        let q = build_query(request);
        let limit = request.limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params: Vec<(&str, &str)> =
            vec![("q", q.as_str()), ("type", "track"), ("limit", limit.as_str())];
        if let Some(market) = &self.options.market {
            params.push(("market", market.as_str()));
        }

        let mut attempt = 0;
        loop {
            self.rate_limit();

            let response = match self
                .client
                .get(self.search_url())
                .bearer_auth(&self.token)
                .query(&params)
                .send()
            {
                Ok(response) => response,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.options.max_retries => {
                    warn!(attempt, error = %e, "search request failed, retrying");
                    std::thread::sleep(backoff(attempt));
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(SearchError::Network(e.to_string())),
            };

            let status = response.status();
            if status.is_success() {
                let body = response
                    .text()
                    .map_err(|e| SearchError::Network(e.to_string()))?;
                return decode_tracks(&body);
            }

            match status.as_u16() {
                429 => {
                    let wait = retry_after_secs(response.headers()).unwrap_or(1);
                    if attempt >= self.options.max_retries {
                        return Err(SearchError::RateLimited {
                            retry_after_secs: wait,
                        });
                    }
                    warn!(attempt, wait, "rate limited by Spotify");
                    std::thread::sleep(Duration::from_secs(wait).min(MAX_RETRY_WAIT));
                }
                401 | 403 => {
                    let body = response.text().unwrap_or_default();
                    return Err(SearchError::Unauthorized(format!("{}: {}", status, body)));
                }
                code if status.is_server_error() && attempt < self.options.max_retries => {
                    warn!(attempt, status = code, "server error from Spotify, retrying");
                    std::thread::sleep(backoff(attempt));
                }
                code => {
                    let body = response.text().unwrap_or_default();
                    return Err(SearchError::Api { status: code, body });
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StructuredFilter;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_build_query_structured() {
        let request = SearchRequest {
            text: "Daft Punk One More Time".to_string(),
            filter: Some(StructuredFilter {
                artist: "Daft Punk".to_string(),
                title: "One More Time".to_string(),
                album: None,
            }),
            limit: 10,
        };
        assert_eq!(build_query(&request), r#"track:"One More Time" artist:"Daft Punk""#);
    }

    #[test]
    fn test_build_query_with_album_strips_quotes() {
        let request = SearchRequest {
            text: String::new(),
            filter: Some(StructuredFilter {
                artist: "A".to_string(),
                title: "The \"Song\"".to_string(),
                album: Some("LP".to_string()),
            }),
            limit: 10,
        };
        assert_eq!(build_query(&request), r#"track:"The Song" artist:"A" album:"LP""#);
    }

    #[test]
    fn test_build_query_free_text() {
        let request = SearchRequest {
            text: "Just A Title".to_string(),
            filter: None,
            limit: 10,
        };
        assert_eq!(build_query(&request), "Just A Title");
    }

    #[test]
    fn test_decode_tracks() {
        let body = r#"{
            "tracks": {
                "items": [
                    {"id": "0DiWol3AO6WpXZgp0goxAV", "name": "One More Time",
                     "artists": [{"name": "Daft Punk"}], "album": {"name": "Discovery"}},
                    {"id": null, "name": "Broken", "artists": []},
                    null,
                    {"id": "2", "name": "Aerodynamic", "artists": [{"name": "Daft Punk"}, {"name": null}]}
                ]
            }
        }"#;
        let tracks = decode_tracks(body).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "0DiWol3AO6WpXZgp0goxAV");
        assert_eq!(tracks[0].album.as_deref(), Some("Discovery"));
        assert_eq!(tracks[1].artists, vec!["Daft Punk"]);
        assert_eq!(tracks[1].album, None);
    }

    #[test]
    fn test_decode_empty_page() {
        let tracks = decode_tracks(r#"{"tracks": {"items": []}}"#).unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_decode_rejects_unexpected_shapes() {
        assert!(matches!(
            decode_tracks(r#"{"albums": {}}"#),
            Err(SearchError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_tracks("not json"),
            Err(SearchError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after_secs(&headers), Some(7));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after_secs(&headers), None);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(2000));
        assert_eq!(backoff(20), backoff(6));
    }

    #[test]
    fn test_unreachable_host_is_network_error() {
        let provider = SpotifySearch::new(
            "token".to_string(),
            SpotifyOptions {
                api_base: "http://127.0.0.1:1".to_string(),
                max_retries: 0,
                min_interval: Duration::ZERO,
                timeout: Duration::from_secs(2),
                ..Default::default()
            },
        )
        .unwrap();
        let request = SearchRequest {
            text: "x".to_string(),
            filter: None,
            limit: 10,
        };
        let err = provider.search(&request).unwrap_err();
        assert!(matches!(err, SearchError::Network(_)));
        assert!(!err.is_fatal());
    }
}
