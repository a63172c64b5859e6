//! Ledger reconciliation: applies one scan's hit batch to the store as a set
//! of idempotent transitions. Every function here expects to run inside the
//! scan transaction owned by the engine; a storage error anywhere rolls the
//! whole scan back.

use rusqlite::{params, Connection, OptionalExtension, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::engine::ScanOutcome;
use crate::scanner::tags::{Hit, TagKind};
use crate::storage::models::{EventType, NoteStatus};

/// Per-category counters produced by one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileCounts {
    pub slugs_found: i64,
    pub evidence_added: i64,
    pub done_forced: i64,
    pub stale_marked: i64,
    pub revived_count: i64,
    pub orphan_files_removed: i64,
}

/// Apply the full hit batch for a scan.
///
/// Upsert/revive runs before forced completion so a stale note reappearing
/// with a DONE tag in the same scan is revived first and then completed,
/// ending in `done`. Staleness marking and orphan cleanup only run on full
/// scans; diff scans inspect a subset of files and have no authority to
/// declare anything missing.
pub fn apply_hits(
    conn: &Connection,
    hits: &[Hit],
    full: bool,
    seen_paths: &BTreeSet<String>,
    now: &str,
) -> Result<ReconcileCounts> {
    let mut note_ids: BTreeMap<String, i64> = BTreeMap::new();
    let mut done_slugs: BTreeSet<String> = BTreeSet::new();
    let mut revived_count = 0i64;
    let mut evidence_added = 0i64;

    for hit in hits {
        if hit.kind == TagKind::Done {
            done_slugs.insert(hit.slug.clone());
        }

        // Upsert/revive once per unique slug; evidence once per hit.
        let note_id = match note_ids.get(&hit.slug) {
            Some(id) => *id,
            None => {
                let (id, revived) = upsert_note(conn, &hit.slug, now)?;
                if revived {
                    revived_count += 1;
                }
                note_ids.insert(hit.slug.clone(), id);
                id
            }
        };

        if add_evidence(conn, note_id, hit, now)? {
            evidence_added += 1;
        }
    }

    let done_forced = force_done(conn, &done_slugs, now)?;

    let seen_slugs: BTreeSet<String> = note_ids.keys().cloned().collect();
    let stale_marked = mark_missing_as_stale(conn, full, &seen_slugs, now)?;

    let orphan_files_removed = if full {
        cleanup_orphan_file_state(conn, seen_paths)?
    } else {
        0
    };

    Ok(ReconcileCounts {
        slugs_found: note_ids.len() as i64,
        evidence_added,
        done_forced,
        stale_marked,
        revived_count,
        orphan_files_removed,
    })
}

/// Create the note as `open` on first sighting, or revive it from `stale`.
/// Returns (note_id, revived).
pub(crate) fn upsert_note(conn: &Connection, slug: &str, now: &str) -> Result<(i64, bool)> {
    let existing: Option<(i64, NoteStatus)> = conn
        .query_row(
            "SELECT id, status FROM notes WHERE slug = ?1",
            params![slug],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        Some((id, NoteStatus::Stale)) => {
            conn.execute(
                "UPDATE notes SET status = 'open', updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            insert_event(
                conn,
                id,
                EventType::StatusChange,
                Some("stale"),
                Some("open"),
                now,
            )?;
            debug!("Revived note {}", slug);
            Ok((id, true))
        }
        Some((id, _)) => Ok((id, false)),
        None => {
            conn.execute(
                "INSERT INTO notes (slug, status, priority, created_at, updated_at) \
                 VALUES (?1, 'open', NULL, ?2, ?2)",
                params![slug, now],
            )?;
            let id = conn.last_insert_rowid();
            insert_event(conn, id, EventType::Created, None, Some("open"), now)?;
            Ok((id, false))
        }
    }
}

/// Insert an evidence row unless the (note_id, filepath, line_no) key already
/// exists. Re-scanning an unchanged occurrence never grows evidence.
pub(crate) fn add_evidence(
    conn: &Connection,
    note_id: i64,
    hit: &Hit,
    now: &str,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO evidence (note_id, filepath, line_no, snippet, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![note_id, hit.path, hit.line, hit.snippet, now],
    )?;
    Ok(inserted > 0)
}

/// Transition DONE-tagged notes to `done` when currently active. Notes
/// already `done` or `stale` are untouched.
pub(crate) fn force_done(
    conn: &Connection,
    done_slugs: &BTreeSet<String>,
    now: &str,
) -> Result<i64> {
    let mut forced = 0i64;
    let mut lookup = conn.prepare("SELECT id, status FROM notes WHERE slug = ?1")?;

    for slug in done_slugs {
        let existing: Option<(i64, NoteStatus)> = lookup
            .query_row(params![slug], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        let Some((id, status)) = existing else {
            continue;
        };
        if status.is_active() {
            conn.execute(
                "UPDATE notes SET status = 'done', updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            insert_event(
                conn,
                id,
                EventType::StatusChange,
                Some(status.as_str()),
                Some("done"),
                now,
            )?;
            forced += 1;
        }
    }

    Ok(forced)
}

/// Full scans only: every active note whose slug was not observed transitions
/// to `stale`. Diff scans never mark anything stale — hard safety fuse.
pub(crate) fn mark_missing_as_stale(
    conn: &Connection,
    full: bool,
    seen_slugs: &BTreeSet<String>,
    now: &str,
) -> Result<i64> {
    if !full {
        return Ok(0);
    }

    let mut stmt = conn.prepare(
        "SELECT id, slug, status FROM notes WHERE status IN ('open', 'doing', 'parked')",
    )?;
    let active: Vec<(i64, String, NoteStatus)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>>>()?;

    let mut marked = 0i64;
    for (id, slug, status) in active {
        if seen_slugs.contains(&slug) {
            continue;
        }
        conn.execute(
            "UPDATE notes SET status = 'stale', updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        insert_event(
            conn,
            id,
            EventType::StatusChange,
            Some(status.as_str()),
            Some("stale"),
            now,
        )?;
        info!("Marked note {} as stale", slug);
        marked += 1;
    }

    Ok(marked)
}

/// Full scans only: drop file_state rows for paths the walk did not observe.
/// An empty observed set skips cleanup entirely — guard against a walk that
/// returned nothing wiping all file state.
pub(crate) fn cleanup_orphan_file_state(
    conn: &Connection,
    seen_paths: &BTreeSet<String>,
) -> Result<i64> {
    if seen_paths.is_empty() {
        return Ok(0);
    }

    let mut stmt = conn.prepare("SELECT filepath FROM file_state")?;
    let known: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>>>()?;

    let mut removed = 0i64;
    for filepath in known {
        if seen_paths.contains(&filepath) {
            continue;
        }
        conn.execute(
            "DELETE FROM file_state WHERE filepath = ?1",
            params![filepath],
        )?;
        removed += 1;
    }

    Ok(removed)
}

pub(crate) fn insert_event(
    conn: &Connection,
    note_id: i64,
    event_type: EventType,
    old_value: Option<&str>,
    new_value: Option<&str>,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO note_events (note_id, event_type, old_value, new_value, changed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![note_id, event_type, old_value, new_value, now],
    )?;
    Ok(())
}

/// One audit row per scan invocation, plus the last-scan timestamp. Runs in
/// the same transaction as the reconciler so the ledger effects and their
/// audit record appear together or not at all.
pub fn record_scan(conn: &Connection, outcome: &ScanOutcome, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO scan_log ( \
             scanned_at, scanned_root, full, \
             files_scanned, slugs_found, evidence_added, \
             done_forced, stale_marked, revived_count, orphan_files_removed \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            now,
            outcome.scanned_root,
            outcome.full,
            outcome.files_scanned,
            outcome.slugs_found,
            outcome.evidence_added,
            outcome.done_forced,
            outcome.stale_marked,
            outcome.revived_count,
            outcome.orphan_files_removed,
        ],
    )?;
    conn.execute(
        "UPDATE scan_state SET last_scan_at = ?1 WHERE id = 1",
        params![now],
    )?;
    Ok(())
}
