// crates/dyntable-core/src/core/schema.rs
// ============================================================================
// Module: Dyntable Schema Types
// Description: Table layout constants and live column descriptors.
// Purpose: Describe the wide data table and the append-only log table.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The data table has a fixed integer identifier column and a dynamic
//! remainder. Column descriptors are views over the live table definition;
//! they are produced fresh on every catalog query and never persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the wide, dynamically shaped data table.
pub const DATA_TABLE: &str = "data_entries";
/// Name of the append-only change log table.
pub const LOG_TABLE: &str = "update_log";
/// Name of the identifier column of the data table.
pub const ID_COLUMN: &str = "id";

// ============================================================================
// SECTION: Column Descriptor
// ============================================================================

/// Live definition of one column of the data table.
///
/// # Invariants
/// - `default_value` holds the engine's default expression text verbatim.
/// - Exactly one descriptor per table has `is_primary_key` set (the identifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as declared.
    pub name: String,
    /// Declared type text (may be empty for untyped columns).
    pub declared_type: String,
    /// Whether the column carries a `NOT NULL` constraint.
    pub not_null: bool,
    /// Default value expression, if any.
    pub default_value: Option<String>,
    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
}

impl ColumnDescriptor {
    /// Returns true when this descriptor names `other`, using the engine's
    /// case-insensitive identifier comparison.
    #[must_use]
    pub fn is_named(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// Returns true when this is the identifier column.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        self.is_primary_key || self.is_named(ID_COLUMN)
    }
}

/// Finds the descriptor for `name` in a column list.
#[must_use]
pub fn find_column<'a>(columns: &'a [ColumnDescriptor], name: &str) -> Option<&'a ColumnDescriptor> {
    columns.iter().find(|column| column.is_named(name))
}
