// crates/dyntable-core/src/runtime/changelog.rs
// ============================================================================
// Module: Dyntable Change Log
// Description: Append-only record of row updates.
// Purpose: Keep a timestamped trail of every successful update.
// Dependencies: crate::core, crate::interfaces, serde_jcs, time, thiserror
// ============================================================================

//! ## Overview
//! Each successful update appends one `{row id, timestamp, fields}` record to
//! the log table. Field maps are serialized with the JSON Canonicalization
//! Scheme so identical updates always produce identical payloads. The log
//! performs no foreign-key check against the data table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::ChangeLogEntry;
use crate::core::FieldMap;
use crate::core::LOG_TABLE;
use crate::core::RowId;
use crate::interfaces::SqlEngine;
use crate::interfaces::SqlStatement;
use crate::interfaces::SqlValue;
use crate::runtime::engine::SharedEngine;
use crate::runtime::sql::quote_ident;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Change log failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    /// Field map or timestamp could not be serialized.
    #[error("change log serialization failed: {0}")]
    Serialize(String),
    /// The log table rejected the append or read.
    #[error("change log db error: {0}")]
    Db(String),
}

// ============================================================================
// SECTION: Change Log
// ============================================================================

/// Recorder for row updates.
#[derive(Clone)]
pub struct ChangeLog {
    /// Shared storage engine.
    engine: SharedEngine,
}

impl ChangeLog {
    /// Creates a change log over the shared engine.
    #[must_use]
    pub const fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
        }
    }

    /// Appends one entry for an update of `row_id` with `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when serialization or the append fails.
    pub fn record(&self, row_id: RowId, fields: &FieldMap) -> Result<ChangeLogEntry, LogError> {
        let changed_fields =
            serde_jcs::to_string(fields).map_err(|err| LogError::Serialize(err.to_string()))?;
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| LogError::Serialize(err.to_string()))?;
        let statement = SqlStatement::with_params(
            format!("INSERT INTO {} (id, timestamp, data) VALUES (?, ?, ?)", quote_ident(LOG_TABLE)),
            vec![
                SqlValue::Integer(row_id.get()),
                SqlValue::Text(timestamp.clone()),
                SqlValue::Text(changed_fields.clone()),
            ],
        );
        self.engine.execute(&statement).map_err(|err| LogError::Db(err.to_string()))?;
        Ok(ChangeLogEntry {
            row_id,
            timestamp,
            changed_fields,
        })
    }

    /// Lists the entries recorded for `row_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the log table cannot be read.
    pub fn entries_for(&self, row_id: RowId) -> Result<Vec<ChangeLogEntry>, LogError> {
        let statement = SqlStatement::with_params(
            format!(
                "SELECT timestamp, data FROM {} WHERE id = ? ORDER BY rowid",
                quote_ident(LOG_TABLE)
            ),
            vec![SqlValue::Integer(row_id.get())],
        );
        let rows = self.engine.query(&statement).map_err(|err| LogError::Db(err.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut values = row.into_iter();
                ChangeLogEntry {
                    row_id,
                    timestamp: values.next().flatten().unwrap_or_default(),
                    changed_fields: values.next().flatten().unwrap_or_default(),
                }
            })
            .collect())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
