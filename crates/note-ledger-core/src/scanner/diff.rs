use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;

use super::rel_unix_path;
use crate::error::Error;

/// Diff-mode file selection: files whose current (mtime_ns, size_bytes)
/// fingerprint differs from the persisted one, or that have no persisted
/// fingerprint yet. The stored fingerprint is refreshed for every file
/// inspected, changed or not, inside the caller's transaction.
///
/// Also returns the full set of observed relative paths; in diff mode that
/// set carries no staleness authority downstream.
pub fn select_changed(
    conn: &Connection,
    root: &Path,
    files: &[PathBuf],
    now: &str,
) -> Result<(Vec<PathBuf>, BTreeSet<String>), Error> {
    let mut to_scan: Vec<PathBuf> = Vec::new();
    let mut seen_paths: BTreeSet<String> = BTreeSet::new();

    let mut lookup = conn.prepare(
        "SELECT mtime_ns, size_bytes FROM file_state WHERE filepath = ?1",
    )?;
    let mut upsert = conn.prepare(
        "INSERT OR REPLACE INTO file_state (filepath, mtime_ns, size_bytes, last_seen_at) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    for path in files {
        let Some(rel) = rel_unix_path(root, path) else {
            continue;
        };
        seen_paths.insert(rel.clone());

        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                continue;
            }
        };
        let (mtime_ns, size_bytes) = fingerprint(&metadata);

        let stored: Option<(i64, i64)> = lookup
            .query_row(params![rel], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        upsert.execute(params![rel, mtime_ns, size_bytes, now])?;

        if stored != Some((mtime_ns, size_bytes)) {
            to_scan.push(path.clone());
        }
    }

    Ok((to_scan, seen_paths))
}

/// (mtime_ns, size_bytes). A content change that round-trips to the same
/// fingerprint is indistinguishable from no change; accepted approximation.
fn fingerprint(metadata: &fs::Metadata) -> (i64, i64) {
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    (mtime_ns, metadata.len() as i64)
}
