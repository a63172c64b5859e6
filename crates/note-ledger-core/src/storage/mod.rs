pub mod models;
pub mod queries;
mod sqlite;

pub use queries::{CommentFilter, NoteFilter, NoteUpdate, PriorityFilter, UpdateOutcome};
pub use sqlite::Database;
