//! Build the offline search catalog from a JSON-lines track dump.
//!
//! Each input line is one track: `{"id": "...", "title": "...", "artists": [...], "album": "..."}`.

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use playlist_reconcile::config::PAGE_SIZE;
use playlist_reconcile::models::Candidate;
use playlist_reconcile::progress::{create_progress_bar, create_spinner, log_progress, set_log_only};
use playlist_reconcile::provider::catalog::{
    create_schema, insert_tracks, optimize, rebuild_index, SqliteCatalog,
};
use playlist_reconcile::provider::{SearchProvider, SearchRequest};
use playlist_reconcile::query::parse;
use playlist_reconcile::resolver::select_best;
use playlist_reconcile::safety::{validate_output_path, CATALOG_MARKER};

#[derive(Parser)]
#[command(name = "index-catalog")]
#[command(about = "Build a SQLite FTS track catalog from a JSON-lines dump")]
struct Args {
    /// JSON-lines track dump
    source: PathBuf,

    /// Output database (file name must contain "catalog")
    output: PathBuf,

    /// Run a playlist-style line against the built catalog, e.g. "Daft Punk - One More Time"
    #[arg(long)]
    test: Option<String>,

    /// Disable progress bars, print periodic progress lines instead
    #[arg(long)]
    log_only: bool,
}

/// Parse a JSON-lines dump. Malformed lines are counted and skipped.
fn read_tracks(path: &Path) -> Result<(Vec<Candidate>, usize)> {
    let spinner = create_spinner("Phase 1: Reading tracks");
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;

    let mut tracks = Vec::new();
    let mut malformed = 0;
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of {:?}", i + 1, path))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Candidate>(&line) {
            Ok(track) if !track.id.is_empty() && !track.title.trim().is_empty() => tracks.push(track),
            _ => malformed += 1,
        }
        if (i + 1) % 100_000 == 0 {
            spinner.set_message(format!("Phase 1: Reading tracks ({})", i + 1));
        }
    }

    spinner.finish_with_message(format!(
        "Phase 1: Read {} tracks ({} malformed lines skipped)",
        tracks.len(),
        malformed
    ));
    Ok((tracks, malformed))
}

fn write_catalog(conn: &mut Connection, tracks: &[Candidate]) -> Result<usize> {
    let pb = create_progress_bar(tracks.len() as u64, "Phase 2: Writing tracks");
    let total = tracks.len() as u64;
    let mut written = 0u64;

    let inserted = insert_tracks(conn, tracks, || {
        written += 1;
        pb.inc(1);
        log_progress("write", written, total, 100_000);
    })?;

    pb.finish_with_message(format!("Phase 2: Wrote {} tracks", inserted));
    Ok(inserted)
}

fn build_fts_index(conn: &Connection) -> Result<()> {
    let spinner = create_spinner("Phase 3: Building FTS index");
    rebuild_index(conn)?;
    spinner.finish_with_message("Phase 3: FTS index built");
    Ok(())
}

fn optimize_database(conn: &Connection) -> Result<()> {
    let spinner = create_spinner("Phase 4: Optimizing database");
    optimize(conn)?;
    spinner.finish_with_message("Phase 4: Database optimized");
    Ok(())
}

fn test_search(catalog: &SqliteCatalog, line: &str) -> Result<()> {
    println!("\nSearch results for '{}':", line);
    println!("{:-<80}", "");

    let query = parse(line);
    let candidates = catalog.search(&SearchRequest::for_query(&query, PAGE_SIZE))?;

    if candidates.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for candidate in &candidates {
        println!("{}", candidate.summary());
    }

    if let Some(best) = select_best(&query, &candidates) {
        println!(
            "\nBest: {} confidence={:.2} (title={:.0}, album={:.0}, artist gate {})",
            best.candidate.summary(),
            best.confidence,
            best.breakdown.title_score,
            best.breakdown.album_score,
            if best.breakdown.artist_gate_passed { "passed" } else { "failed" }
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    validate_output_path(&args.output, CATALOG_MARKER, &[args.source.as_path()])?;

    let start = Instant::now();

    println!("Reading track dump: {:?}", args.source);
    let (tracks, malformed) = read_tracks(&args.source)?;

    if args.output.exists() {
        std::fs::remove_file(&args.output).context("Failed to remove existing output file")?;
    }

    println!("Creating catalog: {:?}", args.output);
    let mut conn = Connection::open(&args.output).context("Failed to create output database")?;

    create_schema(&conn)?;
    let inserted = write_catalog(&mut conn, &tracks)?;
    build_fts_index(&conn)?;
    optimize_database(&conn)?;

    let elapsed = start.elapsed();
    let file_size = std::fs::metadata(&args.output)?.len();

    println!("\n{:=<60}", "");
    println!("Catalog complete!");
    println!("  Tracks: {}", inserted);
    println!("  Duplicate ids: {}", tracks.len() - inserted);
    println!("  Malformed lines: {}", malformed);
    println!("  Output size: {:.2} MB", file_size as f64 / 1_048_576.0);
    println!("  Elapsed: {:.2}s", elapsed.as_secs_f64());
    println!("{:=<60}", "");

    if let Some(line) = args.test {
        let catalog = SqliteCatalog::from_connection(conn);
        test_search(&catalog, &line)?;
    }

    Ok(())
}
