//! Error types for deck storage and deck operations.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the persistence layer.
///
/// "Deck not found" is not a storage failure: stores report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt deck data: {0}")]
    Corrupt(String),
    #[error("File already exists: {}", .0.display())]
    Exists(PathBuf),
}

impl From<tempfile::PersistError> for StorageError {
    fn from(e: tempfile::PersistError) -> Self {
        Self::Io(e.error)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced to the user by a single command or menu action.
///
/// None of these end the process; each aborts only the operation that
/// raised it.
#[derive(Debug, Error)]
pub enum DeckError {
    /// Deck lookup failed.
    #[error("Deck not found: {0}")]
    NotFound(String),

    /// Deck creation collided with an existing deck.
    #[error("Deck already exists: {0}")]
    AlreadyExists(String),

    /// Card index outside `0..len`.
    #[error("Card index {index} out of range (deck has {len} cards)")]
    Index { index: i64, len: usize },

    /// Unparseable or empty user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage medium unavailable or corrupt.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Reading from or writing to the terminal failed.
    #[error("Console error: {0}")]
    Console(std::io::Error),
}

pub type DeckResult<T> = Result<T, DeckError>;
