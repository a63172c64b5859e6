use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Result};
use tracing::debug;

use super::models::*;
use super::sqlite::Database;
use crate::error::Error;
use crate::ledger::insert_event;

pub const PRIORITY_MIN: i64 = 1;
pub const PRIORITY_MAX: i64 = 3;

/// Filters for the notes listing.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub statuses: Vec<NoteStatus>,
    pub priority: Option<PriorityFilter>,
    pub comment: Option<CommentFilter>,
}

/// Priority filter: an explicit `none` bucket (priority IS NULL) and/or a set
/// of values in 1..=3.
#[derive(Debug, Clone, Default)]
pub struct PriorityFilter {
    pub include_none: bool,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentFilter {
    /// Notes with at least one comment event.
    Any,
    /// Notes with no comment events.
    None,
}

impl NoteFilter {
    /// Parse the operator-facing string forms: comma-separated statuses,
    /// `none|1|2|3` priority lists, and `any|none` for comments.
    pub fn parse(
        status: Option<&str>,
        priority: Option<&str>,
        comment: Option<&str>,
    ) -> std::result::Result<Self, Error> {
        let mut filter = NoteFilter::default();

        if let Some(raw) = status {
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let parsed = part
                    .parse::<NoteStatus>()
                    .map_err(Error::InvalidFilter)?;
                filter.statuses.push(parsed);
            }
            if filter.statuses.is_empty() {
                return Err(Error::InvalidFilter("empty status filter".to_string()));
            }
        }

        if let Some(raw) = priority {
            let parts: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if parts.is_empty() {
                return Err(Error::InvalidFilter("empty priority filter".to_string()));
            }
            let mut pf = PriorityFilter::default();
            for part in parts {
                if part.eq_ignore_ascii_case("none") {
                    pf.include_none = true;
                    continue;
                }
                let v: i64 = part.parse().map_err(|_| {
                    Error::InvalidFilter(format!("invalid priority: {}", part))
                })?;
                if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&v) {
                    return Err(Error::InvalidFilter(format!(
                        "priority out of range: {}",
                        v
                    )));
                }
                if !pf.values.contains(&v) {
                    pf.values.push(v);
                }
            }
            pf.values.sort_unstable();
            filter.priority = Some(pf);
        }

        if let Some(raw) = comment {
            filter.comment = Some(match raw.trim().to_ascii_lowercase().as_str() {
                "any" => CommentFilter::Any,
                "none" => CommentFilter::None,
                other => {
                    return Err(Error::InvalidFilter(format!(
                        "invalid comment filter: {}",
                        other
                    )))
                }
            });
        }

        Ok(filter)
    }
}

/// A partial note edit. `priority: Some(None)` clears the priority; a field
/// left as `None` is untouched.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub status: Option<NoteStatus>,
    pub priority: Option<Option<i64>>,
    pub comment: Option<String>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.comment.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// No real change; nothing written, no event appended.
    Unchanged,
    Updated(Note),
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

impl Database {
    // ── Notes listing / export ───────────────────────────────────

    pub fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<NoteSummary>> {
        let mut where_clauses: Vec<String> = Vec::new();
        let mut bind: Vec<Value> = Vec::new();

        if !filter.statuses.is_empty() {
            where_clauses.push(format!(
                "n.status IN ({})",
                placeholders(filter.statuses.len())
            ));
            bind.extend(
                filter
                    .statuses
                    .iter()
                    .map(|s| Value::from(s.as_str().to_string())),
            );
        }

        if let Some(pf) = &filter.priority {
            match (pf.include_none, pf.values.is_empty()) {
                (true, true) => where_clauses.push("n.priority IS NULL".to_string()),
                (false, false) => {
                    where_clauses.push(format!(
                        "n.priority IN ({})",
                        placeholders(pf.values.len())
                    ));
                    bind.extend(pf.values.iter().map(|v| Value::from(*v)));
                }
                (true, false) => {
                    where_clauses.push(format!(
                        "(n.priority IS NULL OR n.priority IN ({}))",
                        placeholders(pf.values.len())
                    ));
                    bind.extend(pf.values.iter().map(|v| Value::from(*v)));
                }
                (false, true) => {}
            }
        }

        match filter.comment {
            Some(CommentFilter::Any) => where_clauses.push(
                "EXISTS (SELECT 1 FROM note_events ne \
                 WHERE ne.note_id = n.id AND ne.event_type = 'comment')"
                    .to_string(),
            ),
            Some(CommentFilter::None) => where_clauses.push(
                "NOT EXISTS (SELECT 1 FROM note_events ne \
                 WHERE ne.note_id = n.id AND ne.event_type = 'comment')"
                    .to_string(),
            ),
            None => {}
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT n.id, n.slug, n.status, n.priority, n.created_at, n.updated_at, \
                    COUNT(e.id) AS evidence_count \
             FROM notes n \
             LEFT JOIN evidence e ON n.id = e.note_id \
             {} \
             GROUP BY n.id \
             ORDER BY CASE WHEN n.priority IS NULL THEN 0 ELSE 1 END, \
                      n.priority ASC, \
                      n.updated_at DESC",
            where_sql
        );

        let mut stmt = self.connection().prepare(&sql)?;
        let notes = stmt
            .query_map(params_from_iter(bind), |row| {
                Ok(NoteSummary {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    status: row.get(2)?,
                    priority: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                    evidence_count: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(notes)
    }

    /// Export projection; soft-deleted/archived notes are excluded unless
    /// explicitly requested.
    pub fn export_notes(
        &self,
        include_deleted: bool,
        include_archived: bool,
    ) -> Result<Vec<NoteSummary>> {
        let mut where_clauses: Vec<&str> = Vec::new();
        if !include_deleted {
            where_clauses.push("n.is_deleted = 0");
        }
        if !include_archived {
            where_clauses.push("n.is_archived = 0");
        }
        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT n.id, n.slug, n.status, n.priority, n.created_at, n.updated_at, \
                    COUNT(e.id) AS evidence_count \
             FROM notes n \
             LEFT JOIN evidence e ON n.id = e.note_id \
             {} \
             GROUP BY n.id \
             ORDER BY n.updated_at DESC",
            where_sql
        );

        let mut stmt = self.connection().prepare(&sql)?;
        let notes = stmt
            .query_map([], |row| {
                Ok(NoteSummary {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    status: row.get(2)?,
                    priority: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                    evidence_count: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(notes)
    }

    // ── Note detail ──────────────────────────────────────────────

    pub fn note_detail(&self, slug: &str) -> Result<Option<NoteDetail>> {
        let note = match self.get_note(slug)? {
            Some(note) => note,
            None => return Ok(None),
        };

        let mut stmt = self.connection().prepare(
            "SELECT id, note_id, filepath, line_no, snippet, created_at \
             FROM evidence WHERE note_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let evidence = stmt
            .query_map(params![note.id], |row| {
                Ok(Evidence {
                    id: row.get(0)?,
                    note_id: row.get(1)?,
                    filepath: row.get(2)?,
                    line_no: row.get(3)?,
                    snippet: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut stmt = self.connection().prepare(
            "SELECT id, note_id, event_type, old_value, new_value, changed_at \
             FROM note_events WHERE note_id = ?1 ORDER BY id ASC",
        )?;
        let events = stmt
            .query_map(params![note.id], |row| {
                Ok(NoteEvent {
                    id: row.get(0)?,
                    note_id: row.get(1)?,
                    event_type: row.get(2)?,
                    old_value: row.get(3)?,
                    new_value: row.get(4)?,
                    changed_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(NoteDetail {
            note,
            evidence,
            events,
        }))
    }

    pub fn get_note(&self, slug: &str) -> Result<Option<Note>> {
        self.connection()
            .query_row(
                "SELECT id, slug, status, priority, created_at, updated_at, \
                        is_deleted, is_archived \
                 FROM notes WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(Note {
                        id: row.get(0)?,
                        slug: row.get(1)?,
                        status: row.get(2)?,
                        priority: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                        is_deleted: row.get(6)?,
                        is_archived: row.get(7)?,
                    })
                },
            )
            .optional()
    }

    // ── Note edits ───────────────────────────────────────────────

    /// Apply a partial edit with exactly-once event semantics: no-op edits
    /// write nothing and append no events.
    pub fn update_note(
        &self,
        slug: &str,
        update: &NoteUpdate,
    ) -> std::result::Result<UpdateOutcome, Error> {
        if update.is_empty() {
            return Ok(UpdateOutcome::Unchanged);
        }

        if let Some(Some(p)) = update.priority {
            if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&p) {
                return Err(Error::InvalidUpdate(format!(
                    "priority must be {}..={}",
                    PRIORITY_MIN, PRIORITY_MAX
                )));
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection().unchecked_transaction()?;

        let old = tx
            .query_row(
                "SELECT id, status, priority FROM notes WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, NoteStatus>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((note_id, old_status, old_priority)) = old else {
            return Err(Error::NoteNotFound(slug.to_string()));
        };

        let new_status = update.status.unwrap_or(old_status);
        let new_priority = match update.priority {
            Some(p) => p,
            None => old_priority,
        };

        let changed = new_status != old_status
            || new_priority != old_priority
            || update.comment.is_some();
        if !changed {
            return Ok(UpdateOutcome::Unchanged);
        }

        tx.execute(
            "UPDATE notes SET status = ?1, priority = ?2, updated_at = ?3 WHERE id = ?4",
            params![new_status, new_priority, now, note_id],
        )?;

        if new_status != old_status {
            insert_event(
                &tx,
                note_id,
                EventType::StatusChange,
                Some(old_status.as_str()),
                Some(new_status.as_str()),
                &now,
            )?;
        }
        if new_priority != old_priority {
            insert_event(
                &tx,
                note_id,
                EventType::PriorityChange,
                old_priority.map(|v| v.to_string()).as_deref(),
                new_priority.map(|v| v.to_string()).as_deref(),
                &now,
            )?;
        }
        if let Some(comment) = &update.comment {
            insert_event(&tx, note_id, EventType::Comment, None, Some(comment), &now)?;
        }

        tx.commit()?;
        debug!("Updated note {} (id {})", slug, note_id);

        let note = self
            .get_note(slug)?
            .ok_or_else(|| Error::NoteNotFound(slug.to_string()))?;
        Ok(UpdateOutcome::Updated(note))
    }

    // ── Summary / history ────────────────────────────────────────

    pub fn summary(&self) -> Result<LedgerSummary> {
        let total: i64 =
            self.connection()
                .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;

        let mut counts: Vec<(NoteStatus, i64)> = Vec::new();
        for status in NoteStatus::ALL {
            let count: i64 = self.connection().query_row(
                "SELECT COUNT(*) FROM notes WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?;
            counts.push((status, count));
        }

        let last_scan_at: Option<String> = self.connection().query_row(
            "SELECT last_scan_at FROM scan_state WHERE id = 1",
            [],
            |row| row.get(0),
        )?;

        Ok(LedgerSummary {
            total,
            by_status: counts,
            last_scan_at,
        })
    }

    /// Newest-first scan log rows. `limit` must be in 1..=2000.
    pub fn scan_history(&self, limit: i64) -> std::result::Result<Vec<ScanLogEntry>, Error> {
        if !(1..=2000).contains(&limit) {
            return Err(Error::InvalidFilter("limit must be 1..=2000".to_string()));
        }

        let mut stmt = self.connection().prepare(
            "SELECT id, scanned_at, scanned_root, full, \
                    files_scanned, slugs_found, evidence_added, \
                    done_forced, stale_marked, revived_count, orphan_files_removed \
             FROM scan_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(ScanLogEntry {
                    id: row.get(0)?,
                    scanned_at: row.get(1)?,
                    scanned_root: row.get(2)?,
                    full: row.get(3)?,
                    files_scanned: row.get(4)?,
                    slugs_found: row.get(5)?,
                    evidence_added: row.get(6)?,
                    done_forced: row.get(7)?,
                    stale_marked: row.get(8)?,
                    revived_count: row.get(9)?,
                    orphan_files_removed: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn last_scan_at(&self) -> Result<Option<String>> {
        self.connection().query_row(
            "SELECT last_scan_at FROM scan_state WHERE id = 1",
            [],
            |row| row.get(0),
        )
    }
}
