// crates/dyntable-core/src/core/identifiers.rs
// ============================================================================
// Module: Dyntable Identifiers
// Description: Row identifiers and SQL identifier validation.
// Purpose: Keep caller-supplied names safe to interpolate into statements.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Row identifiers are the engine-assigned integer keys of the data table.
//! Column names and declared types arrive from callers at runtime and are
//! spliced into DDL/DML text, so they are validated here before any statement
//! is built. Validation is strict and ASCII-only; quoting in
//! [`crate::runtime::sql`] is applied on top of it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum byte length of a column name.
pub const MAX_COLUMN_NAME_LENGTH: usize = 64;
/// Maximum byte length of a declared column type.
pub const MAX_DECLARED_TYPE_LENGTH: usize = 64;

/// Column-constraint keywords that may not appear as declared type words.
const CONSTRAINT_KEYWORDS: [&str; 11] = [
    "AS",
    "CHECK",
    "COLLATE",
    "CONSTRAINT",
    "DEFAULT",
    "GENERATED",
    "NOT",
    "NULL",
    "PRIMARY",
    "REFERENCES",
    "UNIQUE",
];

// ============================================================================
// SECTION: Row Identifier
// ============================================================================

/// Identifier of a row in the data table.
///
/// # Invariants
/// - Mirrors the engine rowid; assigned on insert and never rewritten by
///   schema rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(i64);

impl RowId {
    /// Creates a row identifier from a raw engine value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RowId {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| IdentifierError::InvalidRowId(value.to_string()))
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Identifier validation failures.
///
/// # Invariants
/// - Messages echo only the offending character or a bounded prefix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Name or type was empty.
    #[error("identifier must be non-empty")]
    Empty,
    /// Name or type exceeded the length limit.
    #[error("identifier exceeds {max} bytes")]
    TooLong {
        /// Maximum allowed length in bytes.
        max: usize,
    },
    /// First character is not allowed.
    #[error("identifier must start with an ascii letter or underscore, found {0:?}")]
    InvalidStart(char),
    /// A character outside the allowed set was found.
    #[error("identifier contains disallowed character {0:?}")]
    InvalidChar(char),
    /// Declared type is not a recognizable SQL type expression.
    #[error("declared type is malformed: {0}")]
    MalformedType(String),
    /// Row identifier text did not parse as an integer.
    #[error("invalid row id: {0}")]
    InvalidRowId(String),
}

/// Validates a caller-supplied column name.
///
/// # Errors
///
/// Returns [`IdentifierError`] when the name is empty, too long, or uses
/// characters outside `[A-Za-z0-9_]` (the first must not be a digit).
pub fn validate_column_name(name: &str) -> Result<(), IdentifierError> {
    if name.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if name.len() > MAX_COLUMN_NAME_LENGTH {
        return Err(IdentifierError::TooLong {
            max: MAX_COLUMN_NAME_LENGTH,
        });
    }
    let mut chars = name.chars();
    if let Some(first) = chars.next()
        && !(first.is_ascii_alphabetic() || first == '_')
    {
        return Err(IdentifierError::InvalidStart(first));
    }
    for ch in chars {
        if !(ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(IdentifierError::InvalidChar(ch));
        }
    }
    Ok(())
}

/// Validates a declared column type such as `TEXT`, `VARCHAR(255)` or
/// `DOUBLE PRECISION` or `DECIMAL(10, 2)`.
///
/// # Errors
///
/// Returns [`IdentifierError`] when the type is empty, too long, names a
/// column-constraint keyword, or is not of the form
/// `words [ "(" digits [ "," digits ] ")" ]`.
pub fn validate_declared_type(declared_type: &str) -> Result<(), IdentifierError> {
    if declared_type.trim().is_empty() {
        return Err(IdentifierError::Empty);
    }
    if declared_type.len() > MAX_DECLARED_TYPE_LENGTH {
        return Err(IdentifierError::TooLong {
            max: MAX_DECLARED_TYPE_LENGTH,
        });
    }
    let (words, size) = match declared_type.split_once('(') {
        Some((words, rest)) => {
            let Some(inner) = rest.strip_suffix(')') else {
                return Err(IdentifierError::MalformedType("unclosed size suffix".to_string()));
            };
            (words, Some(inner))
        }
        None => (declared_type, None),
    };
    validate_type_words(words)?;
    if let Some(inner) = size {
        validate_type_size(inner)?;
    }
    Ok(())
}

/// Validates the space-separated words of a declared type.
fn validate_type_words(words: &str) -> Result<(), IdentifierError> {
    let trimmed = words.trim_end();
    if trimmed.is_empty() {
        return Err(IdentifierError::MalformedType("missing type name".to_string()));
    }
    if trimmed.contains("  ") || trimmed.starts_with(' ') {
        return Err(IdentifierError::MalformedType("irregular spacing".to_string()));
    }
    for word in trimmed.split(' ') {
        let mut chars = word.chars();
        if let Some(first) = chars.next()
            && !first.is_ascii_alphabetic()
        {
            return Err(IdentifierError::InvalidStart(first));
        }
        for ch in chars {
            if !(ch.is_ascii_alphanumeric() || ch == '_') {
                return Err(IdentifierError::InvalidChar(ch));
            }
        }
        if CONSTRAINT_KEYWORDS.iter().any(|keyword| word.eq_ignore_ascii_case(keyword)) {
            return Err(IdentifierError::MalformedType(format!(
                "constraint keyword `{word}` in type"
            )));
        }
    }
    Ok(())
}

/// Validates the `n` or `p, s` size arguments of a declared type.
fn validate_type_size(inner: &str) -> Result<(), IdentifierError> {
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.is_empty() || parts.len() > 2 {
        return Err(IdentifierError::MalformedType("size takes one or two numbers".to_string()));
    }
    for part in parts {
        if part.is_empty() {
            return Err(IdentifierError::MalformedType("empty size argument".to_string()));
        }
        if let Some(ch) = part.chars().find(|ch| !ch.is_ascii_digit()) {
            return Err(IdentifierError::InvalidChar(ch));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
