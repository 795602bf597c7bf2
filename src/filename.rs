//! File name grammar for migration scripts.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::migration::MigrationId;

/// Errors produced while parsing a migration file name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileNameError {
    /// The name starts with neither the version prefix nor the repeat
    /// marker.
    #[error("migration file name '{file_name}' does not start with version prefix '{expected}' or the repeat marker")]
    InvalidVersionPrefix {
        /// The offending file name.
        file_name: String,
        /// The configured version prefix.
        expected: String,
    },

    /// The version token failed to parse as an ordering key.
    #[error("migration file name '{file_name}' has unparsable version '{version}': {reason}")]
    InvalidVersion {
        /// The offending file name.
        file_name: String,
        /// The token scanned as the version.
        version: String,
        /// Why the token failed to parse.
        reason: String,
    },

    /// The delimiter before the description is missing.
    #[error("migration file name '{file_name}' is missing description prefix '{expected}'")]
    MissingDescriptionPrefix {
        /// The offending file name.
        file_name: String,
        /// The configured description prefix.
        expected: String,
    },

    /// The delimiter after the description is missing.
    #[error("migration file name '{file_name}' is missing description suffix '{expected}'")]
    MissingDescriptionSuffix {
        /// The offending file name.
        file_name: String,
        /// The configured description suffix.
        expected: String,
    },

    /// Neither direction marker follows the description.
    #[error("migration file name '{file_name}' has no direction marker (expected '{apply}' or '{undo}')")]
    InvalidDirection {
        /// The offending file name.
        file_name: String,
        /// The configured apply marker.
        apply: String,
        /// The configured undo marker.
        undo: String,
    },

    /// The name ended before a complete identity was scanned.
    #[error("malformed migration file name '{0}'")]
    Malformed(String),
}

/// Configurable tokens of the migration file name grammar.
///
/// The defaults parse `v<version>.<description>.apply.sql`,
/// `v<version>.<description>.undo.sql`, and `repeat.<description>.sql`.
/// Anything after the direction marker (or, for repeatables, after the
/// description's terminating delimiter) is an uninterpreted trailer; it
/// must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameGrammar {
    /// Token before the version. `None` means versions start immediately;
    /// repeatable names are still recognized by the repeat marker.
    pub version_prefix: Option<String>,
    /// Token introducing a repeatable migration.
    pub repeat_marker: String,
    /// Delimiter between the version (or repeat marker) and the
    /// description.
    pub description_prefix: String,
    /// Delimiter terminating the description.
    pub description_suffix: String,
    /// Direction marker for forward migrations.
    pub apply_marker: String,
    /// Direction marker for reverse migrations.
    pub undo_marker: String,
}

impl Default for FileNameGrammar {
    fn default() -> Self {
        Self {
            version_prefix: Some("v".to_string()),
            repeat_marker: "repeat".to_string(),
            description_prefix: ".".to_string(),
            description_suffix: ".".to_string(),
            apply_marker: "apply".to_string(),
            undo_marker: "undo".to_string(),
        }
    }
}

/// Scanner states, entered strictly left to right.
enum Scan<V> {
    VersionPrefix,
    Version,
    Description { version: Option<V> },
    Direction { version: V, description: String },
    Trailer { id: MigrationId<V> },
}

impl FileNameGrammar {
    /// Parses a file name into a migration identity.
    ///
    /// A single left-to-right pass over the name; each state either
    /// consumes a fixed token or scans up to the next occurrence of the
    /// active delimiter. Parsing is total: a name that fails any state
    /// produces an error, never a partial identity.
    pub fn parse<V>(&self, file_name: &str) -> Result<MigrationId<V>, FileNameError>
    where
        V: FromStr,
        V::Err: fmt::Display,
    {
        let mut rest = file_name;
        let mut state = Scan::VersionPrefix;

        loop {
            if rest.is_empty() {
                return Err(FileNameError::Malformed(file_name.to_string()));
            }

            state = match state {
                Scan::VersionPrefix => {
                    if let Some(prefix) = self.version_prefix.as_deref() {
                        if let Some(remainder) = rest.strip_prefix(prefix) {
                            rest = remainder;
                            Scan::Version
                        } else if let Some(remainder) =
                            rest.strip_prefix(self.repeat_marker.as_str())
                        {
                            rest = self.pop_description_prefix(remainder, file_name)?;
                            Scan::Description { version: None }
                        } else {
                            return Err(FileNameError::InvalidVersionPrefix {
                                file_name: file_name.to_string(),
                                expected: prefix.to_string(),
                            });
                        }
                    } else if let Some(remainder) =
                        rest.strip_prefix(self.repeat_marker.as_str())
                    {
                        rest = self.pop_description_prefix(remainder, file_name)?;
                        Scan::Description { version: None }
                    } else {
                        Scan::Version
                    }
                }
                Scan::Version => {
                    let end = rest
                        .find(self.description_prefix.as_str())
                        .unwrap_or(rest.len());
                    let token = &rest[..end];
                    rest = self.pop_description_prefix(&rest[end..], file_name)?;
                    let version =
                        token.parse::<V>().map_err(|err| FileNameError::InvalidVersion {
                            file_name: file_name.to_string(),
                            version: token.to_string(),
                            reason: err.to_string(),
                        })?;
                    Scan::Description { version: Some(version) }
                }
                Scan::Description { version: Some(version) } => {
                    let end = rest
                        .find(self.description_suffix.as_str())
                        .unwrap_or(rest.len());
                    let description = rest[..end].to_string();
                    rest = self.pop_description_suffix(&rest[end..], file_name)?;
                    Scan::Direction { version, description }
                }
                Scan::Description { version: None } => {
                    // Repeatable names carry no direction marker; the
                    // description ends at the next suffix occurrence and the
                    // remainder is the trailer.
                    let end = rest
                        .find(self.description_suffix.as_str())
                        .unwrap_or(rest.len());
                    let description = rest[..end].to_string();
                    rest = &rest[end..];
                    Scan::Trailer { id: MigrationId::Repeatable { description } }
                }
                Scan::Direction { version, description } => {
                    if let Some(remainder) = rest.strip_prefix(self.apply_marker.as_str()) {
                        rest = remainder;
                        Scan::Trailer { id: MigrationId::Apply { version, description } }
                    } else if let Some(remainder) =
                        rest.strip_prefix(self.undo_marker.as_str())
                    {
                        rest = remainder;
                        Scan::Trailer { id: MigrationId::Undo { version, description } }
                    } else {
                        return Err(FileNameError::InvalidDirection {
                            file_name: file_name.to_string(),
                            apply: self.apply_marker.clone(),
                            undo: self.undo_marker.clone(),
                        });
                    }
                }
                Scan::Trailer { id } => return Ok(id),
            };
        }
    }

    /// Renders the canonical file name for an identity under this grammar,
    /// with a `.sql` extension.
    pub fn file_name<V: fmt::Display>(&self, id: &MigrationId<V>) -> String {
        let version_prefix = self.version_prefix.as_deref().unwrap_or_default();
        match id {
            MigrationId::Apply { version, description } => format!(
                "{version_prefix}{version}{}{description}{}{}.sql",
                self.description_prefix, self.description_suffix, self.apply_marker
            ),
            MigrationId::Undo { version, description } => format!(
                "{version_prefix}{version}{}{description}{}{}.sql",
                self.description_prefix, self.description_suffix, self.undo_marker
            ),
            MigrationId::Repeatable { description } => format!(
                "{}{}{description}.sql",
                self.repeat_marker, self.description_prefix
            ),
        }
    }

    fn pop_description_prefix<'a>(
        &self,
        rest: &'a str,
        file_name: &str,
    ) -> Result<&'a str, FileNameError> {
        rest.strip_prefix(self.description_prefix.as_str()).ok_or_else(|| {
            FileNameError::MissingDescriptionPrefix {
                file_name: file_name.to_string(),
                expected: self.description_prefix.clone(),
            }
        })
    }

    fn pop_description_suffix<'a>(
        &self,
        rest: &'a str,
        file_name: &str,
    ) -> Result<&'a str, FileNameError> {
        rest.strip_prefix(self.description_suffix.as_str()).ok_or_else(|| {
            FileNameError::MissingDescriptionSuffix {
                file_name: file_name.to_string(),
                expected: self.description_suffix.clone(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(file_name: &str) -> Result<MigrationId, FileNameError> {
        FileNameGrammar::default().parse(file_name)
    }

    #[test]
    fn test_parse_apply() {
        assert_eq!(
            parse("v1.create_users.apply.sql").unwrap(),
            MigrationId::Apply { version: 1, description: "create_users".to_string() }
        );
    }

    #[test]
    fn test_parse_undo() {
        assert_eq!(
            parse("v1.create_users.undo.sql").unwrap(),
            MigrationId::Undo { version: 1, description: "create_users".to_string() }
        );
    }

    #[test]
    fn test_parse_repeatable() {
        assert_eq!(
            parse("repeat.refresh_views.sql").unwrap(),
            MigrationId::Repeatable { description: "refresh_views".to_string() }
        );
    }

    #[test]
    fn test_parse_zero_padded_version() {
        assert_eq!(
            parse("v001.create_users.apply.sql").unwrap(),
            MigrationId::Apply { version: 1, description: "create_users".to_string() }
        );
    }

    #[test]
    fn test_description_ends_at_first_suffix() {
        // "create.users" scans as description "create", leaving "users" where
        // a direction marker is expected.
        assert_eq!(
            parse("v1.create.users.apply.sql"),
            Err(FileNameError::InvalidDirection {
                file_name: "v1.create.users.apply.sql".to_string(),
                apply: "apply".to_string(),
                undo: "undo".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_version_prefix() {
        assert_eq!(
            parse("x1.foo.apply.sql"),
            Err(FileNameError::InvalidVersionPrefix {
                file_name: "x1.foo.apply.sql".to_string(),
                expected: "v".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_version() {
        let err = parse("vabc.foo.apply.sql").unwrap_err();
        match err {
            FileNameError::InvalidVersion { version, .. } => assert_eq!(version, "abc"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_description_prefix() {
        assert_eq!(
            parse("v1"),
            Err(FileNameError::MissingDescriptionPrefix {
                file_name: "v1".to_string(),
                expected: ".".to_string(),
            })
        );
        assert_eq!(
            parse("repeatfoo"),
            Err(FileNameError::MissingDescriptionPrefix {
                file_name: "repeatfoo".to_string(),
                expected: ".".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_description_suffix() {
        assert_eq!(
            parse("v1.create_users"),
            Err(FileNameError::MissingDescriptionSuffix {
                file_name: "v1.create_users".to_string(),
                expected: ".".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_direction() {
        let err = parse("v1.create_users.drop.sql").unwrap_err();
        assert!(matches!(err, FileNameError::InvalidDirection { .. }));
    }

    #[test]
    fn test_missing_trailer() {
        assert_eq!(
            parse("v1.create_users.apply"),
            Err(FileNameError::Malformed("v1.create_users.apply".to_string()))
        );
        assert_eq!(
            parse("repeat.views"),
            Err(FileNameError::Malformed("repeat.views".to_string()))
        );
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(parse(""), Err(FileNameError::Malformed(String::new())));
    }

    #[test]
    fn test_custom_grammar() {
        let grammar = FileNameGrammar {
            version_prefix: None,
            repeat_marker: "R".to_string(),
            description_prefix: "__".to_string(),
            description_suffix: "__".to_string(),
            apply_marker: "up".to_string(),
            undo_marker: "down".to_string(),
        };

        assert_eq!(
            grammar.parse::<u64>("42__add_index__up.sql").unwrap(),
            MigrationId::Apply { version: 42, description: "add_index".to_string() }
        );
        assert_eq!(
            grammar.parse::<u64>("42__add_index__down.sql").unwrap(),
            MigrationId::Undo { version: 42, description: "add_index".to_string() }
        );
        assert_eq!(
            grammar.parse::<u64>("R__views__.sql").unwrap(),
            MigrationId::Repeatable { description: "views".to_string() }
        );
    }

    #[test]
    fn test_empty_version_prefix() {
        let grammar =
            FileNameGrammar { version_prefix: Some(String::new()), ..Default::default() };
        assert_eq!(
            grammar.parse::<u64>("1.foo.apply.sql").unwrap(),
            MigrationId::Apply { version: 1, description: "foo".to_string() }
        );
    }

    #[test]
    fn test_repeat_marker_with_absent_version_prefix() {
        let grammar = FileNameGrammar { version_prefix: None, ..Default::default() };
        assert_eq!(
            grammar.parse::<u64>("repeat.views.sql").unwrap(),
            MigrationId::Repeatable { description: "views".to_string() }
        );
        assert_eq!(
            grammar.parse::<u64>("1.foo.apply.sql").unwrap(),
            MigrationId::Apply { version: 1, description: "foo".to_string() }
        );
    }

    #[test]
    fn test_file_name_rendering() {
        let grammar = FileNameGrammar::default();
        let apply = MigrationId::Apply { version: 1u64, description: "create_users".to_string() };
        let undo = MigrationId::Undo { version: 1u64, description: "create_users".to_string() };
        let repeatable = MigrationId::Repeatable { description: "refresh_views".to_string() };

        assert_eq!(grammar.file_name(&apply), "v1.create_users.apply.sql");
        assert_eq!(grammar.file_name(&undo), "v1.create_users.undo.sql");
        assert_eq!(grammar.file_name(&repeatable), "repeat.refresh_views.sql");
    }

    #[test]
    fn test_round_trip() {
        let grammar = FileNameGrammar::default();
        let ids = vec![
            MigrationId::Apply { version: 1u64, description: "create_users".to_string() },
            MigrationId::Undo { version: 17, description: "create_users".to_string() },
            MigrationId::Apply { version: 230, description: "add-index".to_string() },
            MigrationId::Repeatable { description: "refresh_views".to_string() },
        ];

        for id in ids {
            assert_eq!(grammar.parse::<u64>(&grammar.file_name(&id)).unwrap(), id);
        }
    }
}
