//! Worker error types.

use thiserror::Error;

/// Errors raised while serving synchronization requests.
///
/// None of these kill the worker task: the request loop turns them into
/// `ERROR` replies and keeps serving. `ChannelClosed` is the one a caller
/// sees directly, when the worker task itself is gone.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Query or transaction failure on the session connection
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// No attachment carries the given relative path
    #[error("No attachment registered for '{file}'")]
    NotFound { file: String },

    /// The stored metadata blob did not parse
    #[error("Malformed metadata on attachment {post_id}: {source}")]
    MalformedMetadata {
        post_id: i64,
        #[source]
        source: webpsync_codec::DecodeError,
    },

    /// A path is already mapped to a different replacement target
    #[error("Conflicting replacement for '{key}': already mapped to '{existing}', got '{candidate}'")]
    ConflictingReplacement {
        key: String,
        existing: String,
        candidate: String,
    },

    /// The worker task has stopped and can take no more requests
    #[error("Worker channel closed")]
    ChannelClosed,
}
