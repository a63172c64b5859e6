use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Note lifecycle status. `done` is idempotent-terminal for the scan engine;
/// `stale` means the slug was absent from the most recent full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Open,
    Doing,
    Parked,
    Done,
    Stale,
}

impl NoteStatus {
    /// Display order used by summaries.
    pub const ALL: [NoteStatus; 5] = [
        NoteStatus::Open,
        NoteStatus::Doing,
        NoteStatus::Parked,
        NoteStatus::Done,
        NoteStatus::Stale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStatus::Open => "open",
            NoteStatus::Doing => "doing",
            NoteStatus::Parked => "parked",
            NoteStatus::Done => "done",
            NoteStatus::Stale => "stale",
        }
    }

    /// Active statuses are eligible for forced completion and stale marking.
    pub fn is_active(&self) -> bool {
        matches!(self, NoteStatus::Open | NoteStatus::Doing | NoteStatus::Parked)
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(NoteStatus::Open),
            "doing" => Ok(NoteStatus::Doing),
            "parked" => Ok(NoteStatus::Parked),
            "done" => Ok(NoteStatus::Done),
            "stale" => Ok(NoteStatus::Stale),
            other => Err(format!("unknown note status: {}", other)),
        }
    }
}

impl FromSql for NoteStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for NoteStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// Audit event kind. Exactly one event is appended per real change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    StatusChange,
    PriorityChange,
    Comment,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::StatusChange => "status_change",
            EventType::PriorityChange => "priority_change",
            EventType::Comment => "comment",
        }
    }
}

impl FromSql for EventType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "created" => Ok(EventType::Created),
            "status_change" => Ok(EventType::StatusChange),
            "priority_change" => Ok(EventType::PriorityChange),
            "comment" => Ok(EventType::Comment),
            other => Err(FromSqlError::Other(
                format!("unknown event type: {}", other).into(),
            )),
        }
    }
}

impl ToSql for EventType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: i64,
    pub slug: String,
    pub status: NoteStatus,
    pub priority: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
    pub is_archived: bool,
}

/// List/export projection: a note with its evidence count.
#[derive(Debug, Clone, Serialize)]
pub struct NoteSummary {
    pub id: i64,
    pub slug: String,
    pub status: NoteStatus,
    pub priority: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub evidence_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub id: i64,
    pub note_id: i64,
    pub filepath: String,
    pub line_no: i64,
    pub snippet: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteEvent {
    pub id: i64,
    pub note_id: i64,
    pub event_type: EventType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_at: String,
}

/// One note together with its evidence (newest first) and full event history.
#[derive(Debug, Clone, Serialize)]
pub struct NoteDetail {
    pub note: Note,
    pub evidence: Vec<Evidence>,
    pub events: Vec<NoteEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanLogEntry {
    pub id: i64,
    pub scanned_at: String,
    pub scanned_root: String,
    pub full: bool,
    pub files_scanned: i64,
    pub slugs_found: i64,
    pub evidence_added: i64,
    pub done_forced: i64,
    pub stale_marked: i64,
    pub revived_count: i64,
    pub orphan_files_removed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub total: i64,
    pub by_status: Vec<(NoteStatus, i64)>,
    pub last_scan_at: Option<String>,
}
