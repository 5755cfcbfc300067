//! Error types for forge-vault-core.

/// Errors surfaced by the public retrieval and indexing entry points.
///
/// Parse failures never appear here: malformed front-matter and unreadable
/// files are recovered where they happen and only logged.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// The backing vector index could not be read or written.
    ///
    /// Callers should report this as "index unavailable", which is distinct
    /// from an empty result list.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// The embedding service returned an error.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The embedding service did not answer within the configured timeout.
    #[error("embedding timed out after {seconds}s")]
    EmbeddingTimeout { seconds: u64 },

    /// The vault root passed to a reindex does not exist or is not a directory.
    #[error("invalid vault root: {0}")]
    InvalidRoot(String),
}

impl RagError {
    /// Wrap a backing-store failure.
    pub fn index(err: impl std::fmt::Display) -> Self {
        Self::IndexUnavailable(format!("{err:#}"))
    }

    /// Wrap an embedding failure.
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Self::Embedding(format!("{err:#}"))
    }
}

/// Result type alias using [`RagError`].
pub type Result<T> = std::result::Result<T, RagError>;
