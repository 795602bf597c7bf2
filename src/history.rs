//! Migration history rows and the target database contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::migration::{MigrationId, MigrationKind, Version};

/// A row in the target's schema history: one executed migration.
///
/// Rows are append-only facts; fixing a migration never rewrites old rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration<V = u64> {
    /// 1-based order in which this migration was recorded.
    pub rank: i64,
    /// Version for versioned migrations, `None` for repeatables.
    pub version: Option<V>,
    /// Human-readable description from the migration identity.
    pub description: String,
    /// Type of migration.
    pub kind: MigrationKind,
    /// Root-relative script path, when the resolver knows one.
    pub relative_path: Option<String>,
    /// Checksum of the script at execution time.
    pub checksum: String,
    /// Database user who executed the migration.
    pub applied_by: String,
    /// When the migration was executed.
    pub applied_at: DateTime<Utc>,
    /// Execution duration in milliseconds.
    pub duration_ms: i64,
    /// Whether execution succeeded.
    pub succeeded: bool,
}

impl<V: Clone> AppliedMigration<V> {
    /// Builds a history row for a migration identity, deriving version,
    /// kind, and description from it.
    #[allow(clippy::too_many_arguments)]
    pub fn for_migration(
        id: &MigrationId<V>,
        rank: i64,
        relative_path: Option<String>,
        checksum: impl Into<String>,
        applied_by: impl Into<String>,
        applied_at: DateTime<Utc>,
        duration_ms: i64,
        succeeded: bool,
    ) -> Self {
        Self {
            rank,
            version: id.version().cloned(),
            description: id.description().to_string(),
            kind: id.kind(),
            relative_path,
            checksum: checksum.into(),
            applied_by: applied_by.into(),
            applied_at,
            duration_ms,
            succeeded,
        }
    }
}

/// A target database that executes migrations and keeps their history.
///
/// Implemented once per database engine. The target owns serialization of
/// its connection and history log; the engine only requires that reads and
/// appends within one apply run observe each other in order.
#[async_trait]
pub trait MigrationTarget: Send + Sync {
    /// Ordering key used by this target's history rows.
    type Version: Version;

    /// The user identity stamped on recorded history rows.
    async fn current_user(&self) -> MigrateResult<String>;

    /// All previously recorded migrations, oldest first by rank.
    async fn applied_migrations(&self) -> MigrateResult<Vec<AppliedMigration<Self::Version>>>;

    /// Executes a raw migration script. Transactional semantics are
    /// target-defined.
    async fn execute_migration_script(&self, script: &str) -> MigrateResult<()>;

    /// Durably appends one history row. Appends must not be dropped or
    /// reordered within an apply run.
    async fn append_applied_migration(
        &self,
        migration: AppliedMigration<Self::Version>,
    ) -> MigrateResult<()>;
}
