//! Scan — find the file a source should currently be tailing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::error::SourceError;

/// True when `name` starts with `prefix`, ignoring ASCII case.
pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    let name = name.as_bytes();
    let prefix = prefix.as_bytes();
    name.len() >= prefix.len() && name[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Newest-modified regular file in `dir` whose name starts with `prefix`.
///
/// Ties on modification time go to the lexically greater name so repeated
/// scans of an unchanged directory always pick the same file.
pub fn newest_matching(dir: &Path, prefix: &str) -> Result<Option<PathBuf>, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::SourceUnavailable { dir: dir.to_path_buf() });
    }

    let scan_fault = |source| SourceError::ScanFault {
        prefix: prefix.to_string(),
        source,
    };

    let mut latest: Option<(SystemTime, String, PathBuf)> = None;

    for entry in fs::read_dir(dir).map_err(scan_fault)? {
        let entry = entry.map_err(scan_fault)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !matches_prefix(&name, prefix) {
            continue;
        }

        // follows symlinks; a dangling link is simply not a candidate
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let newer = match &latest {
            None => true,
            Some((t, n, _)) => (modified, &name) > (*t, n),
        };
        if newer {
            latest = Some((modified, name, entry.path()));
        }
    }

    Ok(latest.map(|(_, _, path)| path))
}
