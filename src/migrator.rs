//! The apply-run orchestrator.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::checksum::checksum;
use crate::error::MigrateResult;
use crate::history::{AppliedMigration, MigrationTarget};
use crate::migration::MigrationId;
use crate::plan::{self, MigrationPlan, PendingMigration};
use crate::resolution::MigrationResolver;

/// Drives apply runs end to end: fetch, validate, plan, execute, record.
///
/// Execution is strictly sequential in pending-set order; the run stops at
/// the first failure. Nothing is recorded for a failing script, and rows
/// recorded for earlier migrations stand.
pub struct Migrator<R, T> {
    resolver: R,
    target: T,
}

/// Outcome of one apply run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport<V = u64> {
    /// Identities applied this run, in execution order.
    pub applied: Vec<MigrationId<V>>,
    /// Wall-clock duration of the whole run in milliseconds.
    pub duration_ms: i64,
}

impl<V> ApplyReport<V> {
    /// Number of migrations applied.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Get a summary of the run.
    pub fn summary(&self) -> String {
        if self.applied.is_empty() {
            "No migrations applied".to_string()
        } else {
            format!("{} applied in {}ms", self.applied.len(), self.duration_ms)
        }
    }
}

/// Applied history and still-pending identities, without executing.
#[derive(Debug, Clone)]
pub struct MigrationStatus<V = u64> {
    /// Recorded history rows, oldest first.
    pub applied: Vec<AppliedMigration<V>>,
    /// Identities an apply run would execute, in order.
    pub pending: Vec<MigrationId<V>>,
}

impl<R, T> Migrator<R, T>
where
    R: MigrationResolver,
    T: MigrationTarget<Version = R::Version>,
{
    /// Creates a migrator over a resolver and a target.
    pub fn new(resolver: R, target: T) -> Self {
        Self { resolver, target }
    }

    /// Validates history and computes the pending set without executing
    /// anything.
    pub async fn plan(&self) -> MigrateResult<MigrationPlan<R::Version>> {
        let (resolved, history) =
            tokio::try_join!(self.resolver.migrations(), self.target.applied_migrations())?;

        plan::validate_history(&resolved, &history).await?;
        let pending = plan::pending_migrations(&resolved, &history).await?;
        Ok(MigrationPlan { pending })
    }

    /// Reports recorded history alongside the pending identities.
    pub async fn status(&self) -> MigrateResult<MigrationStatus<R::Version>> {
        let (resolved, history) =
            tokio::try_join!(self.resolver.migrations(), self.target.applied_migrations())?;

        plan::validate_history(&resolved, &history).await?;
        let pending = plan::pending_migrations(&resolved, &history)
            .await?
            .into_iter()
            .map(|pending| pending.id)
            .collect();

        Ok(MigrationStatus { applied: history, pending })
    }

    /// Applies all pending migrations in order, recording each outcome in
    /// the target's history.
    pub async fn apply(&self) -> MigrateResult<ApplyReport<R::Version>> {
        let started = Instant::now();
        let user = self.target.current_user().await?;

        // The two fetches are independent; neither orders before the other.
        let (resolved, history) =
            tokio::try_join!(self.resolver.migrations(), self.target.applied_migrations())?;
        debug!(
            resolved = resolved.len(),
            history = history.len(),
            "Fetched resolved migrations and history"
        );

        plan::validate_history(&resolved, &history).await?;
        let pending = plan::pending_migrations(&resolved, &history).await?;

        let mut applied = Vec::new();
        for migration in pending {
            let PendingMigration { id, relative_path, script } = migration;

            let execution = Instant::now();
            self.target.execute_migration_script(&script).await?;
            let duration_ms = execution.elapsed().as_millis() as i64;

            let rank = history.len() as i64 + applied.len() as i64 + 1;
            let row = AppliedMigration::for_migration(
                &id,
                rank,
                relative_path,
                checksum(&script),
                user.clone(),
                Utc::now(),
                duration_ms,
                true,
            );
            self.target.append_applied_migration(row).await?;

            info!(migration = %id, rank, duration_ms, "Applied migration");
            applied.push(id);
        }

        let report = ApplyReport { applied, duration_ms: started.elapsed().as_millis() as i64 };
        info!("{}", report.summary());
        Ok(report)
    }
}
