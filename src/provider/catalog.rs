//! Offline track catalog in SQLite with an FTS5 index.
//!
//! Built by the `index-catalog` binary from JSON-lines records. Searches map
//! structured filters to column-scoped FTS phrases and return rows in FTS
//! rank order.

use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::{SearchError, SearchProvider, SearchRequest};
use crate::models::Candidate;

/// Rows per insert transaction
pub const WRITE_BATCH_SIZE: usize = 10_000;

const SCHEMA: &str = "
    CREATE TABLE tracks (
        pk INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        artists_json TEXT NOT NULL,
        artist_text TEXT NOT NULL,
        album TEXT
    );

    CREATE VIRTUAL TABLE tracks_fts USING fts5(
        title, artist_text, album,
        content='tracks',
        content_rowid='pk',
        tokenize='unicode61 remove_diacritics 2'
    );";

// ============================================================================
// Writing
// ============================================================================

/// Create the catalog tables on an empty database.
///
/// The catalog is rebuilt from scratch on every run, so journaling is off.
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = OFF;
         PRAGMA synchronous = OFF;
         PRAGMA temp_store = MEMORY;",
    )?;
    conn.execute_batch(SCHEMA)
}

/// Insert tracks in batched transactions. Duplicate ids keep the first row.
/// `on_row` is called once per input row (for progress reporting).
pub fn insert_tracks(
    conn: &mut Connection,
    tracks: &[Candidate],
    mut on_row: impl FnMut(),
) -> anyhow::Result<usize> {
    let mut inserted = 0;

    for chunk in tracks.chunks(WRITE_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO tracks (id, title, artists_json, artist_text, album)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for track in chunk {
                let artists_json = serde_json::to_string(&track.artists)?;
                inserted += stmt.execute(params![
                    track.id,
                    track.title,
                    artists_json,
                    track.artists.join(" "),
                    track.album,
                ])?;
                on_row();
            }
        }
        tx.commit()?;
    }

    Ok(inserted)
}

/// Rebuild the external-content FTS index from the tracks table.
pub fn rebuild_index(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("INSERT INTO tracks_fts(tracks_fts) VALUES('rebuild')", [])?;
    Ok(())
}

pub fn optimize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("VACUUM; ANALYZE;")
}

// ============================================================================
// FTS Query Building
// ============================================================================

/// Quote text as a single FTS5 phrase.
fn phrase(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(format!("\"{}\"", tokens.join(" ")))
    }
}

/// FTS5 MATCH expression for a request, or `None` if it has no searchable tokens.
pub fn match_expression(request: &SearchRequest) -> Option<String> {
    match &request.filter {
        Some(filter) => {
            let mut terms = Vec::new();
            if let Some(p) = phrase(&filter.title) {
                terms.push(format!("title : {}", p));
            }
            if let Some(p) = phrase(&filter.artist) {
                terms.push(format!("artist_text : {}", p));
            }
            if let Some(p) = filter.album.as_deref().and_then(phrase) {
                terms.push(format!("album : {}", p));
            }
            (!terms.is_empty()).then(|| terms.join(" AND "))
        }
        None => {
            let tokens: Vec<String> = request
                .text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
                .map(|t| format!("\"{}\"", t))
                .collect();
            (!tokens.is_empty()).then(|| tokens.join(" "))
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open an existing catalog read-only.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn track_count(&self) -> Result<i64, SearchError> {
        let conn = self.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SearchProvider for SqliteCatalog {
    fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        let Some(expression) = match_expression(request) else {
            return Ok(Vec::new());
        };

        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT t.id, t.title, t.artists_json, t.album
             FROM tracks_fts fts
             JOIN tracks t ON fts.rowid = t.pk
             WHERE tracks_fts MATCH ?1
             ORDER BY fts.rank
             LIMIT ?2",
        )?;

        let mut rows = stmt.query(params![expression, request.limit as i64])?;
        let mut candidates = Vec::new();

        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let artists_json: String = row.get(2)?;
            let artists: Vec<String> = match serde_json::from_str(&artists_json) {
                Ok(artists) => artists,
                Err(e) => {
                    debug!(id = %id, error = %e, "skipping catalog row with bad artists_json");
                    continue;
                }
            };
            candidates.push(Candidate {
                id,
                artists,
                title: row.get(1)?,
                album: row.get(3)?,
            });
        }

        Ok(candidates)
    }
}
