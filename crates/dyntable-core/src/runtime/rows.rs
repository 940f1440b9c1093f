// crates/dyntable-core/src/runtime/rows.rs
// ============================================================================
// Module: Dyntable Row Store
// Description: Insert, fetch, and update rows against the live column set.
// Purpose: Move untyped text rows in and out of the wide data table.
// Dependencies: crate::core, crate::interfaces, crate::runtime, thiserror
// ============================================================================

//! ## Overview
//! The row store never assumes a column set. Every operation reads the
//! catalog first, validates requested names against it, and only then builds
//! a parameterized statement. Values are always bound, never spliced.
//!
//! Updates follow a two-phase contract: the row change commits on its own,
//! then the change log append is attempted. A failed append is returned as
//! [`UpdateOutcome::log_warning`] and does not undo the update.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::ColumnDescriptor;
use crate::core::DATA_TABLE;
use crate::core::FieldMap;
use crate::core::ID_COLUMN;
use crate::core::Row;
use crate::core::RowId;
use crate::core::find_column;
use crate::interfaces::SqlEngine;
use crate::interfaces::SqlStatement;
use crate::interfaces::SqlValue;
use crate::interfaces::TextRow;
use crate::runtime::catalog::CatalogError;
use crate::runtime::catalog::ColumnCatalog;
use crate::runtime::changelog::ChangeLog;
use crate::runtime::changelog::LogError;
use crate::runtime::engine::SharedEngine;
use crate::runtime::sql::quote_ident;
use crate::runtime::sql::select_rows;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Row store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row has the requested identifier.
    #[error("row {0} not found")]
    NotFound(RowId),
    /// A field names a column the table does not have.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    /// The request is malformed.
    #[error("invalid row request: {0}")]
    Invalid(String),
    /// The column catalog could not be read.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The engine failed the statement.
    #[error("row store db error: {0}")]
    Db(String),
}

/// Result of a committed update.
///
/// # Invariants
/// - The row change is committed whether or not `log_warning` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Identifier of the updated row.
    pub row_id: RowId,
    /// Change log failure, downgraded to a warning.
    pub log_warning: Option<LogError>,
}

// ============================================================================
// SECTION: Row Store
// ============================================================================

/// CRUD access to the data table.
#[derive(Clone)]
pub struct RowStore {
    /// Shared storage engine.
    engine: SharedEngine,
    /// Catalog consulted before every statement.
    catalog: ColumnCatalog,
    /// Recorder invoked after successful updates.
    change_log: ChangeLog,
}

impl RowStore {
    /// Creates a row store over the shared engine.
    #[must_use]
    pub fn new(engine: SharedEngine, change_log: ChangeLog) -> Self {
        Self {
            catalog: ColumnCatalog::new(engine.clone()),
            engine,
            change_log,
        }
    }

    /// Inserts a row and returns its identifier. An empty map inserts a row
    /// with every column at its default.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for unknown columns, an explicit identifier,
    /// catalog failures, or engine constraint violations.
    pub fn insert(&self, fields: &FieldMap) -> Result<RowId, StoreError> {
        let columns = self.catalog.list_columns()?;
        let resolved = resolve_fields(&columns, fields)?;
        let statement = if resolved.is_empty() {
            SqlStatement::new(format!("INSERT INTO {} DEFAULT VALUES", quote_ident(DATA_TABLE)))
        } else {
            let mut names = Vec::with_capacity(resolved.len());
            let mut placeholders = Vec::with_capacity(resolved.len());
            let mut params = Vec::with_capacity(resolved.len());
            for (name, value) in resolved {
                names.push(quote_ident(name));
                placeholders.push("?");
                params.push(SqlValue::from(value));
            }
            SqlStatement::with_params(
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_ident(DATA_TABLE),
                    names.join(", "),
                    placeholders.join(", ")
                ),
                params,
            )
        };
        let outcome = self.engine.execute(&statement).map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(RowId::new(outcome.last_insert_id))
    }

    /// Fetches one row with every currently known column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row matches, or another
    /// [`StoreError`] on catalog or query failure.
    pub fn get(&self, id: RowId) -> Result<Row, StoreError> {
        let columns = self.catalog.list_columns()?;
        let statement = SqlStatement::with_params(
            format!("{} WHERE {} = ?", select_rows(&columns), quote_ident(ID_COLUMN)),
            vec![SqlValue::Integer(id.get())],
        );
        let rows = self.engine.query(&statement).map_err(|err| StoreError::Db(err.to_string()))?;
        let row = rows.into_iter().next().ok_or(StoreError::NotFound(id))?;
        decode_row(&columns, row)
    }

    /// Fetches every row ordered by identifier. An empty table yields an
    /// empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on catalog or query failure.
    pub fn get_all(&self) -> Result<Vec<Row>, StoreError> {
        let columns = self.catalog.list_columns()?;
        let statement = SqlStatement::new(format!(
            "{} ORDER BY {}",
            select_rows(&columns),
            quote_ident(ID_COLUMN)
        ));
        let rows = self.engine.query(&statement).map_err(|err| StoreError::Db(err.to_string()))?;
        rows.into_iter().map(|row| decode_row(&columns, row)).collect()
    }

    /// Updates the given fields of row `id`, then records the change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when `fields` is empty or names unknown
    /// columns, no row matches, or the engine fails. Change log failures are
    /// not errors; see [`UpdateOutcome::log_warning`].
    pub fn update(&self, id: RowId, fields: &FieldMap) -> Result<UpdateOutcome, StoreError> {
        if fields.is_empty() {
            return Err(StoreError::Invalid("update requires at least one field".to_string()));
        }
        let columns = self.catalog.list_columns()?;
        let resolved = resolve_fields(&columns, fields)?;
        let mut assignments = Vec::with_capacity(resolved.len());
        let mut params = Vec::with_capacity(resolved.len() + 1);
        let mut applied = FieldMap::new();
        for (name, value) in resolved {
            assignments.push(format!("{} = ?", quote_ident(name)));
            params.push(SqlValue::from(value));
            applied.insert(name.to_string(), value.to_string());
        }
        params.push(SqlValue::Integer(id.get()));
        let statement = SqlStatement::with_params(
            format!(
                "UPDATE {} SET {} WHERE {} = ?",
                quote_ident(DATA_TABLE),
                assignments.join(", "),
                quote_ident(ID_COLUMN)
            ),
            params,
        );
        let outcome = self.engine.execute(&statement).map_err(|err| StoreError::Db(err.to_string()))?;
        if outcome.rows_affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        let log_warning = self.change_log.record(id, &applied).err();
        Ok(UpdateOutcome {
            row_id: id,
            log_warning,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Matches field keys to live columns, returning (column name, value) pairs.
fn resolve_fields<'a>(
    columns: &'a [ColumnDescriptor],
    fields: &'a FieldMap,
) -> Result<Vec<(&'a str, &'a str)>, StoreError> {
    let mut resolved = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        let column =
            find_column(columns, key).ok_or_else(|| StoreError::UnknownColumn(key.clone()))?;
        if column.is_identifier() {
            return Err(StoreError::Invalid("the identifier column is engine-assigned".to_string()));
        }
        resolved.push((column.name.as_str(), value.as_str()));
    }
    Ok(resolved)
}

/// Converts a `select_rows` result row into a [`Row`].
fn decode_row(columns: &[ColumnDescriptor], row: TextRow) -> Result<Row, StoreError> {
    let names: Vec<&str> = columns
        .iter()
        .filter(|column| !column.is_identifier())
        .map(|column| column.name.as_str())
        .collect();
    if row.len() != names.len() + 1 {
        return Err(StoreError::Db(format!(
            "expected {} columns, engine returned {}",
            names.len() + 1,
            row.len()
        )));
    }
    let mut values = row.into_iter();
    let id = values
        .next()
        .flatten()
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| StoreError::Db("row identifier is not an integer".to_string()))?;
    let fields: BTreeMap<String, Option<String>> =
        names.into_iter().map(str::to_string).zip(values).collect();
    Ok(Row {
        id: RowId::new(id),
        fields,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
