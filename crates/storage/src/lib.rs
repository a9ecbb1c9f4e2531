//! Storage Layer
//!
//! SQLite persistence for alert, emotion and statistics records with the
//! repository pattern. The repository doubles as a durable `AlertSink`.

mod repository;

pub use repository::{Repository, StoredAlert, StoredEmotion};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}
