//! Playlist input: a directory of exported `.txt` playlists, one track per line.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of exported playlist files
pub const PLAYLIST_EXTENSION: &str = "txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,       // File stem, used as the destination playlist name
    pub lines: Vec<String>, // Non-blank lines, trimmed, in file order
}

/// Split file contents into track lines. Blank lines are dropped; a leading
/// byte-order mark is ignored.
pub fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct PlaylistDir {
    dir: PathBuf,
}

impl PlaylistDir {
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Playlist directory not found: {:?}", dir);
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// All playlists in the directory, sorted by file name.
    pub fn playlists(&self) -> Result<Vec<Playlist>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {:?}", self.dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(PLAYLIST_EXTENSION)
            })
            .collect();
        paths.sort();

        let mut playlists = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                debug!(path = ?path, "skipping playlist with non UTF-8 name");
                continue;
            };
            let contents =
                fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
            playlists.push(Playlist {
                name: name.to_string(),
                lines: parse_lines(&contents),
            });
        }
        Ok(playlists)
    }
}
