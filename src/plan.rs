//! Reconciling resolved migrations against recorded history.

use std::collections::BTreeMap;

use tracing::debug;

use crate::checksum::checksum;
use crate::error::{MigrateResult, MigrationError};
use crate::history::AppliedMigration;
use crate::migration::{MigrationId, MigrationKind, Version};
use crate::resolution::ResolvedMigration;

/// A migration that must run to bring the target up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMigration<V = u64> {
    /// The migration's identity.
    pub id: MigrationId<V>,
    /// Root-relative script path, when known.
    pub relative_path: Option<String>,
    /// Materialized script text.
    pub script: String,
}

/// The ordered set of migrations an apply run would execute.
#[derive(Debug, Clone)]
pub struct MigrationPlan<V = u64> {
    /// Pending migrations in execution order: versioned ascending by
    /// version, then repeatables ascending by description.
    pub pending: Vec<PendingMigration<V>>,
}

impl<V> MigrationPlan<V> {
    /// Check if there is anything to execute.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get a summary of the plan.
    pub fn summary(&self) -> String {
        if self.pending.is_empty() {
            "Up to date".to_string()
        } else {
            format!("{} pending migrations", self.pending.len())
        }
    }
}

/// Verifies recorded history against the resolved migration set.
///
/// Every versioned history row (apply and undo alike) must still resolve
/// to a migration of the same version and kind, and that migration's
/// current checksum must equal the recorded one. Repeatable rows are
/// exempt: changed content re-runs them instead of failing validation.
///
/// Any violation aborts the apply run before a single script executes.
pub async fn validate_history<V: Version>(
    resolved: &[ResolvedMigration<V>],
    history: &[AppliedMigration<V>],
) -> MigrateResult<()> {
    let mut versioned: BTreeMap<(V, MigrationKind), &ResolvedMigration<V>> = BTreeMap::new();
    for migration in resolved {
        if let Some(version) = migration.id().version() {
            versioned.insert((version.clone(), migration.id().kind()), migration);
        }
    }

    for row in history {
        let Some(version) = &row.version else {
            continue;
        };

        let Some(migration) = versioned.get(&(version.clone(), row.kind)) else {
            return Err(MigrationError::MissingMigration {
                version: version.to_string(),
                kind: row.kind,
                description: row.description.clone(),
            });
        };

        let actual = checksum(migration.script().await?);
        if actual != row.checksum {
            return Err(MigrationError::ChecksumMismatch {
                id: migration.id().to_string(),
                description: row.description.clone(),
                expected: row.checksum.clone(),
                actual,
            });
        }
    }

    Ok(())
}

/// Computes the ordered pending set.
///
/// A resolved apply is pending when its version has no history or was most
/// recently undone; resolved undos are never scheduled (they only anchor
/// checksum validation); a resolved repeatable is pending when its
/// description has no history or its recorded checksum differs from the
/// current one. History must be ordered oldest first by rank.
pub async fn pending_migrations<V: Version>(
    resolved: &[ResolvedMigration<V>],
    history: &[AppliedMigration<V>],
) -> MigrateResult<Vec<PendingMigration<V>>> {
    let mut latest_versioned: BTreeMap<&V, MigrationKind> = BTreeMap::new();
    let mut latest_repeatable: BTreeMap<&str, &str> = BTreeMap::new();
    for row in history {
        match (&row.version, row.kind) {
            (Some(version), MigrationKind::Apply | MigrationKind::Undo) => {
                latest_versioned.insert(version, row.kind);
            }
            (None, MigrationKind::Repeatable) => {
                latest_repeatable.insert(&row.description, &row.checksum);
            }
            _ => {}
        }
    }

    let mut pending = Vec::new();
    for migration in resolved {
        let is_pending = match migration.id() {
            MigrationId::Apply { version, .. } => {
                !matches!(latest_versioned.get(version), Some(MigrationKind::Apply))
            }
            MigrationId::Undo { .. } => false,
            MigrationId::Repeatable { description } => {
                match latest_repeatable.get(description.as_str()) {
                    None => true,
                    Some(recorded) => checksum(migration.script().await?) != **recorded,
                }
            }
        };
        if !is_pending {
            continue;
        }

        pending.push(PendingMigration {
            id: migration.id().clone(),
            relative_path: migration.relative_path().map(str::to_string),
            script: migration.script().await?.to_string(),
        });
    }

    pending.sort_by(|a, b| a.id.cmp(&b.id));
    debug!("{} of {} resolved migrations pending", pending.len(), resolved.len());
    Ok(pending)
}
