//! Identifier validation, quoting and shortening for MySQL.
//!
//! Table, column and trigger names cannot be passed as statement parameters,
//! so every generated statement embeds them literally. To do that safely we:
//! 1. Validate identifiers (non-empty, no null bytes, at most 64 characters)
//! 2. Wrap them in backticks, doubling any backtick inside the name
//!
//! Names derived from a table name (triggers, shadow and archive tables) can
//! run past the 64 character limit. [`shorten`] truncates them in a way that
//! keeps their prefix and stays unique per full name.

use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};

/// Maximum identifier length in MySQL, counted in characters.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Number of hex digits of the SHA-256 fingerprint appended by [`shorten`].
const FINGERPRINT_LEN: usize = 8;

/// Validate an identifier.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers longer than [`MAX_IDENTIFIER_LENGTH`] characters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    let len = name.chars().count();
    if len > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, len, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a comma-separated list of identifiers.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote_mysql(n.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Build `prefix + name`, shortened to fit [`MAX_IDENTIFIER_LENGTH`].
///
/// Short results are returned as is. Longer ones keep `prefix`, truncate
/// `name` and append `_` plus the first 8 hex digits of the SHA-256 of the
/// full `name`, so two long names sharing a long common prefix still map to
/// different identifiers.
pub fn shorten(prefix: &str, name: &str) -> String {
    let full = format!("{}{}", prefix, name);
    if full.chars().count() <= MAX_IDENTIFIER_LENGTH {
        return full;
    }

    let fingerprint = fingerprint(name);
    let budget = MAX_IDENTIFIER_LENGTH
        .saturating_sub(prefix.chars().count())
        .saturating_sub(FINGERPRINT_LEN + 1);

    let head: String = name.chars().take(budget).collect();
    let mut short = format!("{}{}_{}", prefix, head, fingerprint);

    // Only reachable with a prefix that is itself close to the limit.
    if short.chars().count() > MAX_IDENTIFIER_LENGTH {
        short = short.chars().take(MAX_IDENTIFIER_LENGTH).collect();
    }
    short
}

fn fingerprint(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..FINGERPRINT_LEN].to_string()
}
