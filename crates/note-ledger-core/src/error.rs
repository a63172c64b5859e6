use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid scan root: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}
