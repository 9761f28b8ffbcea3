//! Error types for the metadata layer.
//!
//! Every fallible operation in the node store, the entity graph and the
//! schema derivation engine returns [`MetadataError`]. The status client has
//! its own error type that never crosses its public boundary.

use thiserror::Error;

/// The result type used throughout the metadata layer.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Errors raised by the metadata layer.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Neither the direct category reference nor the structural parent
    /// resolved to a category.
    #[error("Unable to find category on feed {feed}")]
    CategoryNotFound { feed: String },

    /// A referenced node does not exist or is not of the expected type.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A store operation failed; carries what was being attempted.
    #[error("{message}")]
    Repository {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A store operation failed without additional context.
    #[error("Node store failure: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Node store lock poisoned")]
    LockPoisoned,
}

impl MetadataError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Wrap a store failure with a description of the operation.
    pub fn repository(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Repository {
            message: message.into(),
            source,
        }
    }
}
