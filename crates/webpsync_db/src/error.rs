//! Error types for the catalog layer.

use thiserror::Error;

/// Catalog operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Catalog database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (reading wp-config.php)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wp-config.php does not define {0}")]
    MissingConstant(&'static str),

    #[error("{0} is empty in wp-config.php")]
    EmptyConstant(&'static str),

    /// The prefix is interpolated into table names and must stay plain.
    #[error("table prefix '{0}' contains characters outside [A-Za-z0-9_]")]
    BadPrefix(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
