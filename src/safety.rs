//! Guards against `index-catalog` clobbering the wrong file.
//!
//! The catalog output is deleted and rebuilt on every run, so the path is
//! checked before anything is removed.

use anyhow::{bail, Result};
use std::path::Path;

/// Marker every catalog output file name must carry
pub const CATALOG_MARKER: &str = "catalog";

/// Extensions that belong to inputs or reports, never to a built catalog
const INPUT_EXTENSIONS: [&str; 4] = ["jsonl", "json", "txt", "csv"];

/// Validates that an output path is safe to delete and recreate.
///
/// - the file name must contain `required_pattern`
/// - it must not be one of `source_paths`
/// - it must not carry an input-like extension
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if output == *source {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if let Some(ext) = extension.filter(|e| INPUT_EXTENSIONS.contains(&e.as_str())) {
        bail!(
            "Safety check failed: output '{}' has input file extension '.{}'",
            output.display(),
            ext
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_catalog_output() {
        let output = PathBuf::from("/tmp/spotify-catalog.sqlite3");
        let source = PathBuf::from("/data/tracks.jsonl");
        assert!(validate_output_path(&output, CATALOG_MARKER, &[&source]).is_ok());
    }

    #[test]
    fn test_missing_marker() {
        let output = PathBuf::from("/tmp/output.sqlite3");
        let source = PathBuf::from("/data/tracks.jsonl");
        let result = validate_output_path(&output, CATALOG_MARKER, &[&source]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must contain 'catalog'"));
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/catalog.sqlite3");
        let result = validate_output_path(&path, CATALOG_MARKER, &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }

    #[test]
    fn test_input_extension_blocked() {
        let source = PathBuf::from("/data/tracks.jsonl");
        for name in ["catalog.jsonl", "catalog.JSON", "catalog_notes.txt"] {
            let output = PathBuf::from("/tmp").join(name);
            assert!(
                validate_output_path(&output, CATALOG_MARKER, &[&source]).is_err(),
                "{} should be refused",
                name
            );
        }
    }
}
