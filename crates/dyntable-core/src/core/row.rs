// crates/dyntable-core/src/core/row.rs
// ============================================================================
// Module: Dyntable Row Types
// Description: Untyped rows, field maps, and change log entries.
// Purpose: Exchange row data as text against a runtime-discovered schema.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Rows are untyped at the application boundary: every value is text and the
//! storage engine's loose typing does the rest. Field maps are ordered so that
//! anything serialized from them (change log payloads, responses) is stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RowId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Column name to text value mapping used for inserts and updates.
pub type FieldMap = BTreeMap<String, String>;

/// One row of the data table as returned by fetches.
///
/// # Invariants
/// - `fields` holds one entry per non-identifier column known at fetch time.
/// - `None` marks an SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Row identifier.
    pub id: RowId,
    /// Column values rendered as text.
    pub fields: BTreeMap<String, Option<String>>,
}

impl Row {
    /// Returns the value of `column`, flattening `NULL` and absent columns.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(Option::as_deref)
    }
}

/// Append-only record of one successful row update.
///
/// # Invariants
/// - `timestamp` is RFC 3339 in UTC.
/// - `changed_fields` is the canonical JSON encoding of the update's field map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Identifier of the updated row.
    pub row_id: RowId,
    /// Time the change was recorded.
    pub timestamp: String,
    /// Serialized field map that was applied.
    pub changed_fields: String,
}
