use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use playlist_reconcile::config::{
    ReconcileConfig, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_THRESHOLD, PAGE_SIZE,
};
use playlist_reconcile::models::RunStats;
use playlist_reconcile::progress::{format_duration, set_log_only};
use playlist_reconcile::provider::catalog::SqliteCatalog;
use playlist_reconcile::provider::spotify::{SpotifyOptions, SpotifySearch, DEFAULT_API_BASE};
use playlist_reconcile::provider::SearchProvider;
use playlist_reconcile::reconcile::Reconciler;
use playlist_reconcile::resolver::MatchResolver;
use playlist_reconcile::sink::{flush_report, NotImportedLog, UriFileWriter, SPOTIFY_TRACK_URI_PREFIX};
use playlist_reconcile::source::PlaylistDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Spotify Web API search
    Spotify,
    /// Local SQLite catalog built by index-catalog
    Catalog,
}

#[derive(Parser)]
#[command(name = "playlist-reconcile")]
#[command(about = "Match exported playlist lines against a track catalog and write the imported playlists")]
struct Args {
    /// Directory of exported playlists, one .txt file per playlist
    #[arg(default_value = "playlists")]
    playlists: PathBuf,

    #[arg(long, value_enum, default_value_t = ProviderKind::Spotify)]
    provider: ProviderKind,

    /// Catalog database (required with --provider catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Spotify access token (required with --provider spotify)
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, env = "SPOTIFY_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// ISO 3166-1 market code to restrict search results to
    #[arg(long)]
    market: Option<String>,

    /// Minimum confidence (0.0 to 1.0) for a match to be accepted
    #[arg(long, env = "RECONCILE_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Directory for the imported playlists
    #[arg(long, default_value = "imported")]
    output_dir: PathBuf,

    /// Log of lines that could not be imported (appended to)
    #[arg(long, default_value = "not_imported_songs.txt")]
    not_imported: PathBuf,

    #[arg(long, default_value = SPOTIFY_TRACK_URI_PREFIX)]
    uri_prefix: String,

    /// Parallel search workers (0 = sequential)
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Abort after this many provider failures in a row (0 = never)
    #[arg(long, default_value_t = DEFAULT_MAX_CONSECUTIVE_FAILURES)]
    max_consecutive_failures: usize,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Disable progress bars, print periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Log per-candidate scores
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "playlist_reconcile=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn build_provider(args: &Args) -> Result<Box<dyn SearchProvider>> {
    match args.provider {
        ProviderKind::Spotify => {
            let token = args
                .token
                .clone()
                .context("--token or SPOTIFY_ACCESS_TOKEN is required for the spotify provider")?;
            let options = SpotifyOptions {
                api_base: args.api_base.clone(),
                market: args.market.clone(),
                ..Default::default()
            };
            info!(api_base = %options.api_base, "using Spotify search");
            Ok(Box::new(SpotifySearch::new(token, options)?))
        }
        ProviderKind::Catalog => {
            let path = args
                .catalog
                .as_deref()
                .context("--catalog is required for the catalog provider")?;
            let catalog = SqliteCatalog::open(path)
                .with_context(|| format!("Failed to open catalog {:?}", path))?;
            let tracks = catalog.track_count()?;
            info!(path = ?path, tracks, "using local catalog");
            Ok(Box::new(catalog))
        }
    }
}

fn write_stats(path: Option<&Path>, stats: &RunStats) -> Result<()> {
    if let Some(path) = path {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {:?}", path))?;
        println!("Stats written to {:?}", path);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    init_tracing(args.verbose);

    let config = ReconcileConfig {
        threshold: args.threshold,
        page_size: PAGE_SIZE,
        max_consecutive_failures: args.max_consecutive_failures,
        workers: args.workers,
    }
    .validate()?;

    let start = Instant::now();

    let playlists = PlaylistDir::open(&args.playlists)?.playlists()?;
    if playlists.is_empty() {
        println!("No playlists found in {:?}", args.playlists);
        return Ok(());
    }

    let provider = build_provider(&args)?;
    let resolver = MatchResolver::new(provider).with_page_size(config.page_size);
    let threshold = config.threshold;
    let reconciler = Reconciler::new(resolver, config);

    let mut writer = UriFileWriter::new(&args.output_dir, &args.uri_prefix)?;
    let mut not_imported = NotImportedLog::new(&args.not_imported);
    let mut run = RunStats::default();

    for playlist in &playlists {
        println!("Processing {} songs in {}...", playlist.lines.len(), playlist.name);

        match reconciler.reconcile(&playlist.name, &playlist.lines, threshold) {
            Ok(report) => {
                flush_report(&report, &mut writer, &mut not_imported)?;
                println!(
                    "Finished {}: {}/{} imported ({:.1}%) in {}",
                    playlist.name,
                    report.stats.accepted,
                    report.total_lines,
                    report.stats.match_rate(),
                    format_duration(Duration::from_secs_f64(report.stats.elapsed_seconds))
                );
                run.add(report.stats);
            }
            Err(aborted) => {
                flush_report(&aborted.partial, &mut writer, &mut not_imported)?;
                run.add(aborted.partial.stats.clone());
                run.aborted = true;
                run.elapsed_seconds = start.elapsed().as_secs_f64();
                write_stats(args.stats.as_deref(), &run)?;
                eprintln!(
                    "Aborted {}: {} lines resolved, {} skipped. See {:?}",
                    playlist.name,
                    aborted.partial.processed(),
                    aborted.partial.skipped.len(),
                    not_imported.path()
                );
                return Err(aborted.into());
            }
        }
    }

    run.elapsed_seconds = start.elapsed().as_secs_f64();
    write_stats(args.stats.as_deref(), &run)?;

    println!("\n{:=<60}", "");
    println!("Reconciliation complete!");
    println!("  Playlists: {}", run.playlists.len());
    println!("  Lines: {}", run.total_lines);
    println!("  Imported: {}", run.total_accepted);
    println!("  Not imported: {}", run.total_rejected);
    println!("  Elapsed: {:.2}s", run.elapsed_seconds);
    println!("{:=<60}", "");

    if not_imported.written() > 0 {
        println!("Unmatched lines appended to {:?}", not_imported.path());
    }

    Ok(())
}
