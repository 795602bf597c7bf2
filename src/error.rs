//! Error types for the migration engine.

use thiserror::Error;

use crate::filename::FileNameError;
use crate::migration::MigrationKind;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while resolving, validating, or applying
/// migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file name that does not match the configured grammar.
    #[error(transparent)]
    FileName(#[from] FileNameError),

    /// A resolver was constructed without any search paths.
    #[error("no migration search paths configured")]
    NoSearchPaths,

    /// A history row refers to a migration the resolver no longer produces.
    #[error("missing {kind} migration for version {version} ({description})")]
    MissingMigration {
        /// Version recorded in the history row.
        version: String,
        /// Whether the row recorded an apply or an undo.
        kind: MigrationKind,
        /// Description recorded in the history row.
        description: String,
    },

    /// A previously applied script no longer matches its recorded checksum.
    #[error("checksum mismatch for {id} ({description}): expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Identity of the drifted migration.
        id: String,
        /// Description recorded in the history row.
        description: String,
        /// Checksum recorded when the migration was executed.
        expected: String,
        /// Checksum of the script as currently resolved.
        actual: String,
    },

    /// Database operation error reported by a migration target.
    #[error("database error: {0}")]
    Database(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}
