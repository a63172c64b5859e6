use rusqlite::params;

use note_ledger_core::storage::models::NoteStatus;
use note_ledger_core::storage::{
    CommentFilter, Database, NoteFilter, NoteUpdate, PriorityFilter, UpdateOutcome,
};
use note_ledger_core::Error;

fn seed_note(db: &Database, slug: &str, status: &str, priority: Option<i64>) -> i64 {
    db.connection()
        .execute(
            "INSERT INTO notes (slug, status, priority, created_at, updated_at) \
             VALUES (?1, ?2, ?3, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            params![slug, status, priority],
        )
        .unwrap();
    db.connection().last_insert_rowid()
}

fn seed_comment(db: &Database, note_id: i64, text: &str) {
    db.connection()
        .execute(
            "INSERT INTO note_events (note_id, event_type, old_value, new_value, changed_at) \
             VALUES (?1, 'comment', NULL, ?2, '2026-01-01T00:00:00Z')",
            params![note_id, text],
        )
        .unwrap();
}

fn event_count(db: &Database, note_id: i64) -> i64 {
    db.connection()
        .query_row(
            "SELECT COUNT(*) FROM note_events WHERE note_id = ?1",
            params![note_id],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn list_notes_filters_by_status_set() {
    let db = Database::open_in_memory().unwrap();
    seed_note(&db, "a", "open", None);
    seed_note(&db, "b", "done", None);
    seed_note(&db, "c", "stale", None);

    let filter = NoteFilter {
        statuses: vec![NoteStatus::Open, NoteStatus::Stale],
        ..NoteFilter::default()
    };
    let notes = db.list_notes(&filter).unwrap();
    let slugs: Vec<&str> = notes.iter().map(|n| n.slug.as_str()).collect();
    assert_eq!(slugs.len(), 2);
    assert!(slugs.contains(&"a"));
    assert!(slugs.contains(&"c"));
}

#[test]
fn list_notes_priority_filter_with_none_bucket() {
    let db = Database::open_in_memory().unwrap();
    seed_note(&db, "unset", "open", None);
    seed_note(&db, "high", "open", Some(1));
    seed_note(&db, "low", "open", Some(3));

    let filter = NoteFilter {
        priority: Some(PriorityFilter {
            include_none: true,
            values: vec![1],
        }),
        ..NoteFilter::default()
    };
    let notes = db.list_notes(&filter).unwrap();
    let slugs: Vec<&str> = notes.iter().map(|n| n.slug.as_str()).collect();
    assert_eq!(slugs, vec!["unset", "high"]);

    let only_none = NoteFilter {
        priority: Some(PriorityFilter {
            include_none: true,
            values: vec![],
        }),
        ..NoteFilter::default()
    };
    let notes = db.list_notes(&only_none).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].slug, "unset");
}

#[test]
fn list_notes_orders_null_priority_first_then_ascending() {
    let db = Database::open_in_memory().unwrap();
    seed_note(&db, "p3", "open", Some(3));
    seed_note(&db, "p1", "open", Some(1));
    seed_note(&db, "pnone", "open", None);

    let notes = db.list_notes(&NoteFilter::default()).unwrap();
    let slugs: Vec<&str> = notes.iter().map(|n| n.slug.as_str()).collect();
    assert_eq!(slugs, vec!["pnone", "p1", "p3"]);
}

#[test]
fn list_notes_comment_presence_filter() {
    let db = Database::open_in_memory().unwrap();
    let commented = seed_note(&db, "talked-about", "open", None);
    seed_note(&db, "silent", "open", None);
    seed_comment(&db, commented, "needs discussion");

    let filter = NoteFilter {
        comment: Some(CommentFilter::Any),
        ..NoteFilter::default()
    };
    let notes = db.list_notes(&filter).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].slug, "talked-about");

    let filter = NoteFilter {
        comment: Some(CommentFilter::None),
        ..NoteFilter::default()
    };
    let notes = db.list_notes(&filter).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].slug, "silent");
}

#[test]
fn export_notes_hides_soft_deleted_and_archived_by_default() {
    let db = Database::open_in_memory().unwrap();
    seed_note(&db, "live", "open", None);
    let deleted = seed_note(&db, "deleted", "open", None);
    let archived = seed_note(&db, "archived", "open", None);
    db.connection()
        .execute("UPDATE notes SET is_deleted = 1 WHERE id = ?1", params![deleted])
        .unwrap();
    db.connection()
        .execute("UPDATE notes SET is_archived = 1 WHERE id = ?1", params![archived])
        .unwrap();

    let visible = db.export_notes(false, false).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].slug, "live");

    let everything = db.export_notes(true, true).unwrap();
    assert_eq!(everything.len(), 3);
}

#[test]
fn empty_update_is_unchanged_and_appends_nothing() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_note(&db, "quiet", "open", None);

    let outcome = db.update_note("quiet", &NoteUpdate::default()).unwrap();
    assert!(matches!(outcome, UpdateOutcome::Unchanged));
    assert_eq!(event_count(&db, id), 0);
}

#[test]
fn noop_update_with_same_values_appends_nothing() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_note(&db, "same", "doing", Some(2));

    let update = NoteUpdate {
        status: Some(NoteStatus::Doing),
        priority: Some(Some(2)),
        comment: None,
    };
    let outcome = db.update_note("same", &update).unwrap();
    assert!(matches!(outcome, UpdateOutcome::Unchanged));
    assert_eq!(event_count(&db, id), 0);
}

#[test]
fn status_change_appends_exactly_one_event() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_note(&db, "moving", "open", None);

    let update = NoteUpdate {
        status: Some(NoteStatus::Doing),
        ..NoteUpdate::default()
    };
    let outcome = db.update_note("moving", &update).unwrap();
    match outcome {
        UpdateOutcome::Updated(note) => assert_eq!(note.status, NoteStatus::Doing),
        UpdateOutcome::Unchanged => panic!("expected an update"),
    }
    assert_eq!(event_count(&db, id), 1);

    let (old_value, new_value): (Option<String>, Option<String>) = db
        .connection()
        .query_row(
            "SELECT old_value, new_value FROM note_events WHERE note_id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(old_value.as_deref(), Some("open"));
    assert_eq!(new_value.as_deref(), Some("doing"));
}

#[test]
fn priority_can_be_explicitly_cleared() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_note(&db, "prioritized", "open", Some(2));

    let update = NoteUpdate {
        priority: Some(None),
        ..NoteUpdate::default()
    };
    match db.update_note("prioritized", &update).unwrap() {
        UpdateOutcome::Updated(note) => assert_eq!(note.priority, None),
        UpdateOutcome::Unchanged => panic!("expected an update"),
    }
    assert_eq!(event_count(&db, id), 1);
}

#[test]
fn out_of_range_priority_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    seed_note(&db, "bounded", "open", None);

    let update = NoteUpdate {
        priority: Some(Some(4)),
        ..NoteUpdate::default()
    };
    assert!(matches!(
        db.update_note("bounded", &update),
        Err(Error::InvalidUpdate(_))
    ));
}

#[test]
fn updating_missing_note_reports_not_found() {
    let db = Database::open_in_memory().unwrap();
    let update = NoteUpdate {
        status: Some(NoteStatus::Done),
        ..NoteUpdate::default()
    };
    assert!(matches!(
        db.update_note("ghost", &update),
        Err(Error::NoteNotFound(_))
    ));
}

#[test]
fn comment_always_counts_as_a_change() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_note(&db, "chatty", "open", None);

    let update = NoteUpdate {
        comment: Some("second look needed".to_string()),
        ..NoteUpdate::default()
    };
    match db.update_note("chatty", &update).unwrap() {
        UpdateOutcome::Updated(_) => {}
        UpdateOutcome::Unchanged => panic!("comment must count as a change"),
    }
    assert_eq!(event_count(&db, id), 1);

    let detail = db.note_detail("chatty").unwrap().unwrap();
    assert_eq!(detail.events.len(), 1);
    assert_eq!(detail.events[0].new_value.as_deref(), Some("second look needed"));
}

#[test]
fn summary_reports_all_statuses_and_last_scan() {
    let db = Database::open_in_memory().unwrap();
    seed_note(&db, "a", "open", None);
    seed_note(&db, "b", "open", None);
    seed_note(&db, "c", "done", None);

    let summary = db.summary().unwrap();
    assert_eq!(summary.total, 3);
    let open_count = summary
        .by_status
        .iter()
        .find(|(s, _)| *s == NoteStatus::Open)
        .unwrap()
        .1;
    assert_eq!(open_count, 2);
    assert_eq!(summary.last_scan_at, None);
}

#[test]
fn scan_history_validates_limit() {
    let db = Database::open_in_memory().unwrap();
    assert!(matches!(db.scan_history(0), Err(Error::InvalidFilter(_))));
    assert!(matches!(db.scan_history(2001), Err(Error::InvalidFilter(_))));
    assert!(db.scan_history(2000).unwrap().is_empty());
}

#[test]
fn deleting_a_note_cascades_to_evidence_and_events() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_note(&db, "doomed", "open", None);
    db.connection()
        .execute(
            "INSERT INTO evidence (note_id, filepath, line_no, snippet, created_at) \
             VALUES (?1, 'a.rs', 1, 's', '2026-01-01T00:00:00Z')",
            params![id],
        )
        .unwrap();
    seed_comment(&db, id, "soon gone");

    db.connection()
        .execute("DELETE FROM notes WHERE id = ?1", params![id])
        .unwrap();

    let evidence: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM evidence", [], |row| row.get(0))
        .unwrap();
    let events: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM note_events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(evidence, 0);
    assert_eq!(events, 0);
}

#[test]
fn truncate_all_clears_ledger_but_keeps_scan_state_row() {
    let db = Database::open_in_memory().unwrap();
    seed_note(&db, "x", "open", None);
    db.truncate_all().unwrap();

    let notes: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(notes, 0);
    assert_eq!(db.last_scan_at().unwrap(), None);
}
