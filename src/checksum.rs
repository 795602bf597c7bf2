//! Deterministic content checksums for migration scripts.

use sha2::{Digest, Sha256};

const BOM: char = '\u{feff}';

/// Computes the SHA-256 checksum of a migration script, rendered as
/// lowercase hex.
///
/// The script is normalized before hashing so that content-equivalent
/// scripts hash identically across platforms:
///
/// - a leading byte-order mark is stripped,
/// - `\r\n`, `\r`, and `\n` are all treated as line separators,
/// - trailing whitespace is trimmed from every line,
/// - lines are joined with a single `\n`, with none after the last line.
///
/// Leading indentation and blank lines are significant. The empty script
/// hashes to the digest of the empty byte sequence.
pub fn checksum(script: &str) -> String {
    let script = script.strip_prefix(BOM).unwrap_or(script);

    let mut hasher = Sha256::new();
    let mut first = true;
    for line in lines(script) {
        if !first {
            hasher.update(b"\n");
        }
        first = false;
        hasher.update(line.trim_end().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Splits on `\r\n`, `\r`, and `\n` without collapsing empty lines; a
/// trailing separator yields a final empty line.
fn lines(script: &str) -> Lines<'_> {
    Lines { rest: Some(script) }
}

struct Lines<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find(['\r', '\n']) {
            Some(at) => {
                let separator_len = if rest[at..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = Some(&rest[at + separator_len..]);
                Some(&rest[..at])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}
