//! Migration discovery: resolvers and lazily-read resolved migrations.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::filename::{FileNameError, FileNameGrammar};
use crate::migration::{MigrationId, Version};

/// Future returned by a [`ScriptLoader`].
pub type ScriptFuture = Pin<Box<dyn Future<Output = MigrateResult<String>> + Send>>;

/// Deferred, fallible producer of a migration script's text.
pub type ScriptLoader = Box<dyn Fn() -> ScriptFuture + Send + Sync>;

/// A source of migrations.
///
/// Implementations discover candidate scripts (filesystem directories,
/// embedded catalogs, remote stores) and expose them sorted by identity,
/// with script reads deferred until the text is actually needed.
#[async_trait]
pub trait MigrationResolver: Send + Sync {
    /// Ordering key used by this resolver's migrations.
    type Version: Version;

    /// Discovers all migrations, sorted by identity.
    async fn migrations(&self) -> MigrateResult<Vec<ResolvedMigration<Self::Version>>>;
}

/// A migration discovered by a [`MigrationResolver`].
///
/// Holds the identity, an optional root-relative path label, and a lazy
/// accessor for the script text. The text is read at most once and cached
/// for the rest of the apply run.
pub struct ResolvedMigration<V = u64> {
    id: MigrationId<V>,
    relative_path: Option<String>,
    script: OnceCell<String>,
    load: ScriptLoader,
}

impl<V> ResolvedMigration<V> {
    /// Creates a resolved migration with a deferred script loader.
    pub fn new(id: MigrationId<V>, relative_path: Option<String>, load: ScriptLoader) -> Self {
        Self { id, relative_path, script: OnceCell::new(), load }
    }

    /// Creates a resolved migration from already-materialized script text.
    pub fn from_script(
        id: MigrationId<V>,
        relative_path: Option<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            id,
            relative_path,
            script: OnceCell::new_with(Some(script.into())),
            // The cell is pre-populated; this loader is never consulted.
            load: Box::new(|| Box::pin(async { Ok(String::new()) })),
        }
    }

    /// The migration's identity.
    pub fn id(&self) -> &MigrationId<V> {
        &self.id
    }

    /// Root-relative path of the script, when the resolver knows one.
    pub fn relative_path(&self) -> Option<&str> {
        self.relative_path.as_deref()
    }

    /// The script text, reading it on first access.
    pub async fn script(&self) -> MigrateResult<&str> {
        let script = self.script.get_or_try_init(|| (self.load)()).await?;
        Ok(script.as_str())
    }
}

impl<V: fmt::Debug> fmt::Debug for ResolvedMigration<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedMigration")
            .field("id", &self.id)
            .field("relative_path", &self.relative_path)
            .finish_non_exhaustive()
    }
}

/// Resolves migrations from files in configured directories.
///
/// Each configured path is enumerated non-recursively: only direct children
/// are considered and directories are excluded. Every remaining file name
/// must parse under the configured grammar; the first failure aborts the
/// whole resolution.
pub struct FileSystemMigrationResolver<V = u64> {
    root: PathBuf,
    paths: Vec<String>,
    grammar: FileNameGrammar,
    _version: PhantomData<fn() -> V>,
}

impl<V> FileSystemMigrationResolver<V> {
    /// Creates a resolver searching `paths` relative to the process working
    /// directory.
    ///
    /// Fails with [`MigrationError::NoSearchPaths`] when `paths` is empty.
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>) -> MigrateResult<Self> {
        Self::with_root(std::env::current_dir()?, paths)
    }

    /// Creates a resolver searching `paths` relative to `root`.
    pub fn with_root(
        root: impl Into<PathBuf>,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> MigrateResult<Self> {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(MigrationError::NoSearchPaths);
        }

        Ok(Self {
            root: root.into(),
            paths,
            grammar: FileNameGrammar::default(),
            _version: PhantomData,
        })
    }

    /// Replaces the file name grammar.
    pub fn with_grammar(mut self, grammar: FileNameGrammar) -> Self {
        self.grammar = grammar;
        self
    }
}

#[async_trait]
impl<V> MigrationResolver for FileSystemMigrationResolver<V>
where
    V: Version + FromStr,
    V::Err: fmt::Display,
{
    type Version = V;

    async fn migrations(&self) -> MigrateResult<Vec<ResolvedMigration<V>>> {
        let mut migrations = Vec::new();

        for path in &self.paths {
            let dir = self.root.join(path);
            let mut entries = tokio::fs::read_dir(&dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    continue;
                }

                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    return Err(
                        FileNameError::Malformed(file_name.to_string_lossy().into_owned()).into()
                    );
                };

                let id = self.grammar.parse::<V>(file_name)?;
                let relative_path = format!("{}/{file_name}", path.trim_end_matches('/'));
                let script_path = entry.path();
                let load: ScriptLoader = Box::new(move || {
                    let script_path = script_path.clone();
                    Box::pin(async move { Ok(tokio::fs::read_to_string(&script_path).await?) })
                });

                migrations.push(ResolvedMigration::new(id, Some(relative_path), load));
            }
        }

        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("Resolved {} migrations", migrations.len());
        Ok(migrations)
    }
}
