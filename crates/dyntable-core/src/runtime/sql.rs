// crates/dyntable-core/src/runtime/sql.rs
// ============================================================================
// Module: Dyntable SQL Builders
// Description: Identifier quoting and statement text assembly.
// Purpose: Build DDL/DML for a column set only known at runtime.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Every identifier that reaches statement text goes through
//! [`quote_ident`]. Values never do: they are always bound as parameters.
//! Column lists and projections are derived from catalog output so that the
//! relative column order of the live table is reproduced exactly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::ColumnDescriptor;
use crate::core::DATA_TABLE;
use crate::core::ID_COLUMN;
use crate::core::LOG_TABLE;
use crate::interfaces::SqlStatement;

// ============================================================================
// SECTION: Quoting
// ============================================================================

/// Quotes an identifier for SQLite, doubling embedded quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Joins quoted identifiers with `, `.
#[must_use]
pub fn quoted_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().map(quote_ident).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Bootstrap
// ============================================================================

/// Statements creating the data and log tables when absent.
#[must_use]
pub fn bootstrap_statements() -> Vec<SqlStatement> {
    vec![
        SqlStatement::new(format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY AUTOINCREMENT)",
            quote_ident(DATA_TABLE),
            quote_ident(ID_COLUMN)
        )),
        SqlStatement::new(format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER, timestamp TEXT, data TEXT)",
            quote_ident(LOG_TABLE)
        )),
    ]
}

// ============================================================================
// SECTION: Column Definitions
// ============================================================================

/// Renders a column definition for `CREATE TABLE`, under `name`.
///
/// The identifier column is always recreated as the auto-incrementing
/// primary key so that rebuilt tables keep assigning fresh ids.
#[must_use]
pub fn column_definition(column: &ColumnDescriptor, name: &str) -> String {
    if column.is_identifier() {
        return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(name));
    }
    let mut definition = quote_ident(name);
    if !column.declared_type.is_empty() {
        definition.push(' ');
        definition.push_str(&column.declared_type);
    }
    if column.not_null {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value {
        definition.push_str(" DEFAULT ");
        definition.push_str(default);
    }
    definition
}

/// Builds `SELECT "id", "c1", ... FROM "data_entries"` for the given columns,
/// skipping the identifier (which is always projected first).
#[must_use]
pub fn select_rows(columns: &[ColumnDescriptor]) -> String {
    let names = std::iter::once(ID_COLUMN)
        .chain(columns.iter().filter(|column| !column.is_identifier()).map(|c| c.name.as_str()));
    format!("SELECT {} FROM {}", quoted_list(names), quote_ident(DATA_TABLE))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
