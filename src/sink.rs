//! Output collaborators: the destination playlist and the not-imported log.

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{ReconciliationReport, RejectedLine};

/// The Web API accepts 100 items per add call; stay one below.
pub const MAX_TRACKS_PER_REQUEST: usize = 99;

/// Default URI prefix written in front of each track id
pub const SPOTIFY_TRACK_URI_PREFIX: &str = "spotify:track:";

/// Receives accepted catalog ids for a destination playlist.
pub trait PlaylistWriter {
    fn add_tracks(&mut self, playlist: &str, ids: &[String]) -> Result<()>;
}

/// Receives rejected lines with their diagnostics.
pub trait DiagnosticsSink {
    fn record(&mut self, playlist: &str, rejected: &[RejectedLine]) -> Result<()>;
}

/// Hand ids to the writer in request-sized batches. Returns the number of
/// non-empty batches.
///
/// A playlist with no ids still gets one empty call, so the writer replaces
/// whatever an earlier run left behind.
pub fn write_playlist<W: PlaylistWriter + ?Sized>(
    writer: &mut W,
    playlist: &str,
    ids: &[String],
) -> Result<usize> {
    if ids.is_empty() {
        writer.add_tracks(playlist, &[])?;
        return Ok(0);
    }

    let mut batches = 0;
    for batch in ids.chunks(MAX_TRACKS_PER_REQUEST) {
        writer.add_tracks(playlist, batch)?;
        batches += 1;
    }
    Ok(batches)
}

/// Write everything a report holds: accepted ids to the playlist writer,
/// rejected and skipped lines to the diagnostics sink.
pub fn flush_report<W, D>(report: &ReconciliationReport, writer: &mut W, sink: &mut D) -> Result<()>
where
    W: PlaylistWriter + ?Sized,
    D: DiagnosticsSink + ?Sized,
{
    let batches = write_playlist(writer, &report.playlist, &report.accepted)?;
    debug!(playlist = %report.playlist, ids = report.accepted.len(), batches, "playlist written");

    if !report.rejected.is_empty() {
        sink.record(&report.playlist, &report.rejected)?;
    }

    if !report.skipped.is_empty() {
        let skipped: Vec<RejectedLine> = report
            .skipped
            .iter()
            .map(|line| RejectedLine {
                line: line.clone(),
                diagnostic: "skipped: run aborted".to_string(),
            })
            .collect();
        sink.record(&report.playlist, &skipped)?;
    }
    Ok(())
}

// ============================================================================
// File-backed implementations
// ============================================================================

/// Writes `<dir>/<playlist>.txt` with one track URI per line.
///
/// The first batch for a playlist truncates the file; later batches append.
pub struct UriFileWriter {
    dir: PathBuf,
    uri_prefix: String,
    started: FxHashSet<String>,
}

impl UriFileWriter {
    pub fn new(dir: &Path, uri_prefix: &str) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            uri_prefix: uri_prefix.to_string(),
            started: FxHashSet::default(),
        })
    }

    pub fn playlist_path(&self, playlist: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", playlist))
    }
}

impl PlaylistWriter for UriFileWriter {
    fn add_tracks(&mut self, playlist: &str, ids: &[String]) -> Result<()> {
        let path = self.playlist_path(playlist);
        let first = self.started.insert(playlist.to_string());
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(first)
            .append(!first)
            .open(&path)
            .with_context(|| format!("Failed to open {:?}", path))?;

        let mut out = BufWriter::new(file);
        for id in ids {
            writeln!(out, "{}{}", self.uri_prefix, id)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Appends `"<line> - <diagnostic>"` entries to a single log shared by every
/// playlist in a run.
pub struct NotImportedLog {
    path: PathBuf,
    written: usize,
}

impl NotImportedLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries written during this run
    pub fn written(&self) -> usize {
        self.written
    }
}

impl DiagnosticsSink for NotImportedLog {
    fn record(&mut self, _playlist: &str, rejected: &[RejectedLine]) -> Result<()> {
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;

        let mut out = BufWriter::new(file);
        for entry in rejected {
            writeln!(out, "{}", entry)?;
        }
        out.flush()?;
        self.written += rejected.len();
        Ok(())
    }
}
