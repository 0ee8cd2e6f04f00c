use thiserror::Error;

/// Errors produced by the store layer.
///
/// Domain violations get their own variants so the server layer can map each
/// one to a precise HTTP status instead of pattern-matching on strings.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none. Carries the entity
    /// kind ("user", "group", ...) for the error message.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique-key violation on insert, e.g. registering a mail twice.
    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    /// A user tried to friend themselves.
    #[error("Cannot send a friend request to yourself")]
    SelfReference,

    /// The two users are already linked by a friendship.
    #[error("Users are already friends")]
    AlreadyFriends,

    /// The same-direction friend request is already pending.
    #[error("Friend request already pending")]
    DuplicateRequest,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
