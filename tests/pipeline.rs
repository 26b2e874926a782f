//! End-to-end runs: playlist directory in, imported playlists and the
//! not-imported log out.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::Connection;
use tempfile::TempDir;

use playlist_reconcile::config::ReconcileConfig;
use playlist_reconcile::models::Candidate;
use playlist_reconcile::provider::catalog::{create_schema, insert_tracks, rebuild_index, SqliteCatalog};
use playlist_reconcile::provider::{SearchError, SearchProvider, SearchRequest};
use playlist_reconcile::query::parse;
use playlist_reconcile::reconcile::Reconciler;
use playlist_reconcile::resolver::MatchResolver;
use playlist_reconcile::scoring::evaluate;
use playlist_reconcile::sink::{flush_report, NotImportedLog, UriFileWriter, SPOTIFY_TRACK_URI_PREFIX};
use playlist_reconcile::source::PlaylistDir;

fn track(id: &str, artists: &[&str], title: &str, album: Option<&str>) -> Candidate {
    Candidate {
        id: id.to_string(),
        artists: artists.iter().map(|a| a.to_string()).collect(),
        title: title.to_string(),
        album: album.map(str::to_string),
    }
}

fn build_catalog(path: &Path, tracks: &[Candidate]) {
    let mut conn = Connection::open(path).unwrap();
    create_schema(&conn).unwrap();
    insert_tracks(&mut conn, tracks, || {}).unwrap();
    rebuild_index(&conn).unwrap();
}

fn sample_catalog() -> Vec<Candidate> {
    vec![
        track("daft1", &["Daft Punk"], "One More Time", Some("Discovery")),
        track("daft2", &["Daft Punk"], "Aerodynamic", Some("Discovery")),
        track("song1", &["Artist"], "Song", Some("Greatest Hits")),
        track("bjork1", &["Björk"], "Jóga", Some("Homogenic")),
    ]
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_catalog_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.sqlite3");
    build_catalog(&catalog_path, &sample_catalog());

    let playlists_dir = dir.path().join("playlists");
    fs::create_dir(&playlists_dir).unwrap();
    fs::write(
        playlists_dir.join("Road Trip.txt"),
        "Daft Punk - One More Time\n\
         Unknown Artist - Totally Obscure Track\n\
         \n\
         Artist - Song (Official Video)\n\
         Björk - Jóga + Homogenic\n",
    )
    .unwrap();

    let catalog = SqliteCatalog::open(&catalog_path).unwrap();
    let reconciler = Reconciler::new(MatchResolver::new(catalog), ReconcileConfig::default());

    let playlists = PlaylistDir::open(&playlists_dir).unwrap().playlists().unwrap();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0].lines.len(), 4);

    let out_dir = dir.path().join("imported");
    let log_path = dir.path().join("not_imported_songs.txt");
    let mut writer = UriFileWriter::new(&out_dir, SPOTIFY_TRACK_URI_PREFIX).unwrap();
    let mut log = NotImportedLog::new(&log_path);

    let report = reconciler
        .reconcile(&playlists[0].name, &playlists[0].lines, 0.8)
        .unwrap();
    flush_report(&report, &mut writer, &mut log).unwrap();

    assert_eq!(report.accepted, vec!["daft1", "song1", "bjork1"]);
    assert_eq!(report.stats.no_candidates, 1);
    assert_eq!(report.processed(), report.total_lines);

    let imported = fs::read_to_string(out_dir.join("Road Trip.txt")).unwrap();
    assert_eq!(
        imported,
        "spotify:track:daft1\nspotify:track:song1\nspotify:track:bjork1\n"
    );

    let not_imported = fs::read_to_string(&log_path).unwrap();
    assert_eq!(
        not_imported,
        "Unknown Artist - Totally Obscure Track - no candidates found\n"
    );
}

#[test]
fn test_parallel_run_matches_sequential_on_catalog() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.sqlite3");
    build_catalog(&catalog_path, &sample_catalog());

    let input: Vec<String> = (0..30)
        .map(|i| match i % 3 {
            0 => "Daft Punk - Aerodynamic".to_string(),
            1 => "Nobody - Nothing".to_string(),
            _ => "Daft Punk - One More Time + Discovery".to_string(),
        })
        .collect();

    let sequential = Reconciler::new(
        MatchResolver::new(SqliteCatalog::open(&catalog_path).unwrap()),
        ReconcileConfig::default(),
    )
    .reconcile("Mix", &input, 0.8)
    .unwrap();

    let parallel = Reconciler::new(
        MatchResolver::new(SqliteCatalog::open(&catalog_path).unwrap()),
        ReconcileConfig {
            workers: 4,
            ..Default::default()
        },
    )
    .reconcile("Mix", &input, 0.8)
    .unwrap();

    assert_eq!(sequential.accepted, parallel.accepted);
    assert_eq!(sequential.rejected, parallel.rejected);
    assert_eq!(sequential.accepted.len(), 20);
}

/// Returns the same candidate list for every search.
struct StaticProvider(Vec<Candidate>);

impl SearchProvider for StaticProvider {
    fn search(&self, _request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_shared_second_artist_is_accepted() {
    let provider = StaticProvider(vec![track("b1", &["Artist B"], "Song", Some("Album X"))]);
    let reconciler = Reconciler::new(MatchResolver::new(provider), ReconcileConfig::default());

    let report = reconciler
        .reconcile("Mix", &lines(&["Artist A, Artist B - Song + Album X"]), 0.8)
        .unwrap();
    assert_eq!(report.accepted, vec!["b1"]);
}

#[test]
fn test_near_miss_records_best_candidate() {
    // Title 13/19 similar, no album in the query: (2 * 68.4 + 100) / 300
    let near = track("near", &["Artist"], "abcdefghijklmUVWXYZ", None);
    let line = "Artist - abcdefghijklmnopqrs";
    let confidence = evaluate(&parse(line), &near).confidence;
    assert!(confidence > 0.78 && confidence < 0.8);

    let reconciler = Reconciler::new(
        MatchResolver::new(StaticProvider(vec![near])),
        ReconcileConfig::default(),
    );
    let report = reconciler.reconcile("Mix", &lines(&[line]), 0.8).unwrap();

    assert!(report.accepted.is_empty());
    assert_eq!(report.stats.below_threshold, 1);
    assert_eq!(
        report.rejected[0].diagnostic,
        "best match Artist - abcdefghijklmUVWXYZ (near) scored 0.79, below threshold 0.80"
    );
}

/// Accepts everything until `fail_after` calls, then reports bad credentials.
struct ExpiringProvider {
    calls: AtomicUsize,
    fail_after: usize,
}

impl SearchProvider for ExpiringProvider {
    fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
            return Err(SearchError::Unauthorized("token expired".into()));
        }
        let filter = request.filter.as_ref().unwrap();
        Ok(vec![track(
            &filter.title.to_lowercase(),
            &[filter.artist.as_str()],
            &filter.title,
            None,
        )])
    }
}

#[test]
fn test_abort_flushes_partial_report() {
    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().join("imported");
    let log_path = dir.path().join("not_imported_songs.txt");

    let provider = ExpiringProvider {
        calls: AtomicUsize::new(0),
        fail_after: 2,
    };
    let reconciler = Reconciler::new(MatchResolver::new(provider), ReconcileConfig::default());
    let input = lines(&["A - One", "B - Two", "C - Three", "D - Four"]);

    let aborted = reconciler.reconcile("Mix", &input, 0.8).unwrap_err();
    assert!(aborted.cause.is_fatal());

    let mut writer = UriFileWriter::new(&out_dir, SPOTIFY_TRACK_URI_PREFIX).unwrap();
    let mut log = NotImportedLog::new(&log_path);
    flush_report(&aborted.partial, &mut writer, &mut log).unwrap();

    assert_eq!(
        fs::read_to_string(out_dir.join("Mix.txt")).unwrap(),
        "spotify:track:one\nspotify:track:two\n"
    );
    assert_eq!(
        fs::read_to_string(&log_path).unwrap(),
        "C - Three - skipped: run aborted\nD - Four - skipped: run aborted\n"
    );
}
