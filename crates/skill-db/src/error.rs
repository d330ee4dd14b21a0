use thiserror::Error;

/// Failure kinds surfaced by every [`Store`](crate::Store) implementation.
///
/// `NotFound` and `Conflict` are stable conditions callers branch on; they
/// never carry engine-specific codes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write (user id or username taken).
    #[error("record already exists")]
    Conflict,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
