//! Migration identities and their ordering.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordering key for versioned migrations.
///
/// Blanket-implemented for any comparable, printable, thread-safe type.
/// `u64` is the conventional choice; opaque keys work as long as they
/// compare in application order.
pub trait Version: Ord + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> Version for T where T: Ord + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// The type of migration operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationKind {
    /// Forward migration that applies changes.
    Apply,
    /// Reverse migration that undoes changes.
    Undo,
    /// Repeatable migration, re-run whenever its content changes.
    Repeatable,
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => f.write_str("apply"),
            Self::Undo => f.write_str("undo"),
            Self::Repeatable => f.write_str("repeatable"),
        }
    }
}

/// Identity of a single migration: its role and ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationId<V = u64> {
    /// Forward change tied to a version.
    Apply {
        /// Ordering key of the change.
        version: V,
        /// Human-readable description.
        description: String,
    },
    /// Reverse change tied to a version.
    Undo {
        /// Ordering key of the change this reverses.
        version: V,
        /// Human-readable description.
        description: String,
    },
    /// Unversioned change, re-run when its checksum changes.
    Repeatable {
        /// Human-readable description, also the migration's key.
        description: String,
    },
}

impl<V> MigrationId<V> {
    /// The kind of operation this identity names.
    pub fn kind(&self) -> MigrationKind {
        match self {
            Self::Apply { .. } => MigrationKind::Apply,
            Self::Undo { .. } => MigrationKind::Undo,
            Self::Repeatable { .. } => MigrationKind::Repeatable,
        }
    }

    /// The version, for versioned migrations.
    pub fn version(&self) -> Option<&V> {
        match self {
            Self::Apply { version, .. } | Self::Undo { version, .. } => Some(version),
            Self::Repeatable { .. } => None,
        }
    }

    /// The description.
    pub fn description(&self) -> &str {
        match self {
            Self::Apply { description, .. }
            | Self::Undo { description, .. }
            | Self::Repeatable { description } => description,
        }
    }
}

impl<V: fmt::Display> fmt::Display for MigrationId<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply { version, description } => {
                write!(f, "apply v{version} ({description})")
            }
            Self::Undo { version, description } => {
                write!(f, "undo v{version} ({description})")
            }
            Self::Repeatable { description } => write!(f, "repeatable ({description})"),
        }
    }
}

/// Total order used for both discovery and pending-set output:
/// `apply(v)` sorts before `undo(v)`, both before any higher version, all
/// versioned migrations before all repeatables, repeatables alphabetically
/// by description.
impl<V: Ord> Ord for MigrationId<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        use MigrationId::{Apply, Repeatable, Undo};

        match (self, other) {
            (
                Apply { version: a, description: da },
                Apply { version: b, description: db },
            )
            | (
                Undo { version: a, description: da },
                Undo { version: b, description: db },
            ) => a.cmp(b).then_with(|| da.cmp(db)),
            (Apply { version: a, .. }, Undo { version: b, .. }) => {
                a.cmp(b).then(Ordering::Less)
            }
            (Undo { version: a, .. }, Apply { version: b, .. }) => {
                a.cmp(b).then(Ordering::Greater)
            }
            (Apply { .. } | Undo { .. }, Repeatable { .. }) => Ordering::Less,
            (Repeatable { .. }, Apply { .. } | Undo { .. }) => Ordering::Greater,
            (Repeatable { description: a }, Repeatable { description: b }) => a.cmp(b),
        }
    }
}

impl<V: Ord> PartialOrd for MigrationId<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
