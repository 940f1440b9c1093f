// crates/dyntable-core/src/runtime/mutator.rs
// ============================================================================
// Module: Dyntable Schema Mutator
// Description: Column add, rename, and remove on the live data table.
// Purpose: Evolve the schema without losing rows, ids, or column order.
// Dependencies: crate::core, crate::interfaces, crate::runtime, serde, thiserror
// ============================================================================

//! ## Overview
//! Adding a column is a single `ALTER TABLE .. ADD COLUMN`. Renaming and
//! removing go through a full rebuild because the storage engine cannot be
//! relied on to alter columns in place:
//!
//! 1. create a temporary table with the new column list,
//! 2. copy every row into it with the matching projection,
//! 3. drop the original table,
//! 4. rename the temporary table to the original name.
//!
//! The column list comes from a fresh catalog read, so declared types,
//! constraints and relative order of untouched columns are reproduced. The
//! four statements are submitted as one sequence; whether that sequence is
//! atomic is up to the engine and is reported back in
//! [`SchemaError::rolled_back`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::ColumnDescriptor;
use crate::core::DATA_TABLE;
use crate::core::find_column;
use crate::core::validate_column_name;
use crate::core::validate_declared_type;
use crate::interfaces::SqlEngine;
use crate::interfaces::SqlStatement;
use crate::runtime::catalog::ColumnCatalog;
use crate::runtime::engine::SharedEngine;
use crate::runtime::sql::column_definition;
use crate::runtime::sql::quote_ident;
use crate::runtime::sql::quoted_list;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Stage of a schema operation, used to pinpoint failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStep {
    /// Request validation against names, types and the live schema.
    Validate,
    /// Reading the current column list.
    Inspect,
    /// In-place column addition.
    AddColumn,
    /// Creating the temporary rebuild table.
    CreateTemp,
    /// Copying rows into the temporary table.
    CopyRows,
    /// Dropping the original table.
    DropOriginal,
    /// Renaming the temporary table into place.
    RenameTemp,
}

impl SchemaStep {
    /// Rebuild steps in submission order.
    const REBUILD: [Self; 4] = [Self::CreateTemp, Self::CopyRows, Self::DropOriginal, Self::RenameTemp];

    /// Returns a stable label for the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Inspect => "inspect",
            Self::AddColumn => "add_column",
            Self::CreateTemp => "create_temp",
            Self::CopyRows => "copy_rows",
            Self::DropOriginal => "drop_original",
            Self::RenameTemp => "rename_temp",
        }
    }
}

impl fmt::Display for SchemaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema operation failure.
///
/// # Invariants
/// - When `rolled_back` is false and `step` is past `create_temp`, the
///   database may hold a leftover temporary table or lack the original table;
///   this state is reported, never repaired automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("schema {step} failed: {message}")]
pub struct SchemaError {
    /// Step that failed.
    pub step: SchemaStep,
    /// Failure detail.
    pub message: String,
    /// Whether earlier rebuild statements were rolled back.
    pub rolled_back: bool,
}

impl SchemaError {
    /// Builds a validation failure.
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            step: SchemaStep::Validate,
            message: message.into(),
            rolled_back: false,
        }
    }
}

// ============================================================================
// SECTION: Mutator
// ============================================================================

/// Applies column-level schema changes to the data table.
#[derive(Clone)]
pub struct SchemaMutator {
    /// Shared storage engine.
    engine: SharedEngine,
    /// Catalog used to read the current column list.
    catalog: ColumnCatalog,
}

impl SchemaMutator {
    /// Creates a mutator over the shared engine.
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            catalog: ColumnCatalog::new(engine.clone()),
            engine,
        }
    }

    /// Adds a column in place.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the name or type is invalid, the name
    /// collides with an existing column, or the engine rejects the statement.
    pub fn add_column(&self, name: &str, declared_type: &str) -> Result<(), SchemaError> {
        validate_column_name(name).map_err(|err| SchemaError::invalid(err.to_string()))?;
        let declared_type = declared_type.trim();
        validate_declared_type(declared_type)
            .map_err(|err| SchemaError::invalid(err.to_string()))?;
        let columns = self.inspect()?;
        if find_column(&columns, name).is_some() {
            return Err(SchemaError::invalid(format!("column {name} already exists")));
        }
        let statement = SqlStatement::new(format!(
            "ALTER TABLE {} ADD COLUMN {} {declared_type}",
            quote_ident(DATA_TABLE),
            quote_ident(name)
        ));
        self.engine.execute(&statement).map_err(|err| SchemaError {
            step: SchemaStep::AddColumn,
            message: err.to_string(),
            rolled_back: false,
        })?;
        Ok(())
    }

    /// Renames a column by rebuilding the table.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when `old_name` is unknown or the identifier,
    /// `new_name` is invalid or taken, or any rebuild step fails.
    pub fn rename_column(&self, old_name: &str, new_name: &str) -> Result<(), SchemaError> {
        validate_column_name(new_name).map_err(|err| SchemaError::invalid(err.to_string()))?;
        let columns = self.inspect()?;
        let source = mutable_column(&columns, old_name)?;
        if source.name == new_name {
            return Ok(());
        }
        if let Some(existing) = find_column(&columns, new_name)
            && !existing.is_named(&source.name)
        {
            return Err(SchemaError::invalid(format!("column {new_name} already exists")));
        }
        let plan = RebuildPlan::rename(&columns, &source.name, new_name);
        self.rebuild(&plan)
    }

    /// Removes a column by rebuilding the table without it.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when `name` is unknown or the identifier, or
    /// any rebuild step fails.
    pub fn remove_column(&self, name: &str) -> Result<(), SchemaError> {
        let columns = self.inspect()?;
        let target = mutable_column(&columns, name)?;
        let plan = RebuildPlan::remove(&columns, &target.name);
        self.rebuild(&plan)
    }

    /// Reads the current column list.
    fn inspect(&self) -> Result<Vec<ColumnDescriptor>, SchemaError> {
        self.catalog.list_columns().map_err(|err| SchemaError {
            step: SchemaStep::Inspect,
            message: err.to_string(),
            rolled_back: false,
        })
    }

    /// Submits the rebuild statements and maps failures to their step.
    fn rebuild(&self, plan: &RebuildPlan) -> Result<(), SchemaError> {
        self.engine.execute_sequence(&plan.statements()).map_err(|err| SchemaError {
            step: SchemaStep::REBUILD.get(err.index).copied().unwrap_or(SchemaStep::RenameTemp),
            message: err.error.to_string(),
            rolled_back: err.rolled_back,
        })
    }
}

/// Resolves a non-identifier column by name.
fn mutable_column<'a>(
    columns: &'a [ColumnDescriptor],
    name: &str,
) -> Result<&'a ColumnDescriptor, SchemaError> {
    let column = find_column(columns, name)
        .ok_or_else(|| SchemaError::invalid(format!("unknown column {name}")))?;
    if column.is_identifier() {
        return Err(SchemaError::invalid("the identifier column cannot be changed"));
    }
    Ok(column)
}

// ============================================================================
// SECTION: Rebuild Plan
// ============================================================================

/// Column mapping for a copy-and-swap rebuild.
#[derive(Debug)]
struct RebuildPlan {
    /// Temporary table name.
    temp_table: String,
    /// Kept columns as (descriptor, source name, target name), in order.
    columns: Vec<(ColumnDescriptor, String, String)>,
}

impl RebuildPlan {
    /// Plans a rebuild that renames `old_name` to `new_name`.
    fn rename(columns: &[ColumnDescriptor], old_name: &str, new_name: &str) -> Self {
        let mapped = columns
            .iter()
            .map(|column| {
                let target =
                    if column.name == old_name { new_name } else { column.name.as_str() };
                (column.clone(), column.name.clone(), target.to_string())
            })
            .collect();
        Self {
            temp_table: temp_table_for(old_name),
            columns: mapped,
        }
    }

    /// Plans a rebuild that drops `name`.
    fn remove(columns: &[ColumnDescriptor], name: &str) -> Self {
        let kept = columns
            .iter()
            .filter(|column| column.name != name)
            .map(|column| (column.clone(), column.name.clone(), column.name.clone()))
            .collect();
        Self {
            temp_table: temp_table_for(name),
            columns: kept,
        }
    }

    /// Renders the four rebuild statements in order.
    fn statements(&self) -> Vec<SqlStatement> {
        let temp = quote_ident(&self.temp_table);
        let original = quote_ident(DATA_TABLE);
        let definitions = self
            .columns
            .iter()
            .map(|(column, _, target)| column_definition(column, target))
            .collect::<Vec<_>>()
            .join(", ");
        let targets = quoted_list(self.columns.iter().map(|(_, _, target)| target.as_str()));
        let sources = quoted_list(self.columns.iter().map(|(_, source, _)| source.as_str()));
        vec![
            SqlStatement::new(format!("CREATE TABLE {temp} ({definitions})")),
            SqlStatement::new(format!(
                "INSERT INTO {temp} ({targets}) SELECT {sources} FROM {original}"
            )),
            SqlStatement::new(format!("DROP TABLE {original}")),
            SqlStatement::new(format!("ALTER TABLE {temp} RENAME TO {original}")),
        ]
    }
}

/// Derives the temporary table name from the column being changed.
fn temp_table_for(column: &str) -> String {
    format!("{DATA_TABLE}_rebuild_{column}")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
