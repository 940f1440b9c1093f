// crates/dyntable-store-sqlite/tests/table_service_sqlite.rs
// ============================================================================
// Module: SQLite Table Service Tests
// Description: End-to-end schema and row behavior against a real database.
// Purpose: Validate column changes, row round trips, change logging, and
//          rebuild failure handling on SQLite files.
// ============================================================================

//! ## Overview
//! Integration tests for the table service over [`SqliteEngine`]:
//! - Add, rename and remove columns while preserving rows and ids
//! - Insert, get, get-all and update round trips
//! - Change log entries per update
//! - Atomic and non-atomic rebuild failures
//! - Identifier validation and concurrent access

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::thread;

use dyntable_core::FieldMap;
use dyntable_core::RowId;
use dyntable_core::SchemaStep;
use dyntable_core::ServiceError;
use dyntable_core::SharedEngine;
use dyntable_core::StoreError;
use dyntable_core::TableService;
use dyntable_store_sqlite::SqliteEngine;
use dyntable_store_sqlite::SqliteStoreConfig;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_for(dir: &TempDir, atomic_rebuild: bool) -> SqliteStoreConfig {
    SqliteStoreConfig {
        atomic_rebuild,
        ..SqliteStoreConfig::for_path(dir.path().join("dyntable.db"))
    }
}

fn open_service(dir: &TempDir, atomic_rebuild: bool) -> TableService {
    let engine = SqliteEngine::open(config_for(dir, atomic_rebuild)).expect("open engine");
    TableService::open(SharedEngine::from_engine(engine)).expect("bootstrap")
}

fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect()
}

fn column_names(service: &TableService) -> Vec<String> {
    service.list_columns().unwrap().into_iter().map(|column| column.name).collect()
}

fn table_names(dir: &TempDir) -> Vec<String> {
    let connection = Connection::open(dir.path().join("dyntable.db")).unwrap();
    let mut statement = connection
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    statement.query_map([], |row| row.get(0)).unwrap().map(Result::unwrap).collect()
}

/// Adds a child table whose foreign key blocks dropping the data table.
fn pin_row_with_foreign_key(dir: &TempDir, id: i64) {
    let connection = Connection::open(dir.path().join("dyntable.db")).unwrap();
    connection
        .execute_batch("CREATE TABLE child (parent INTEGER REFERENCES data_entries(id));")
        .unwrap();
    connection.execute("INSERT INTO child (parent) VALUES (?1)", [id]).unwrap();
}

// ============================================================================
// SECTION: Schema Changes
// ============================================================================

#[test]
fn fresh_database_has_only_the_identifier() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    let columns = service.list_columns().unwrap();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].name, "id");
    assert!(columns[0].is_primary_key);
    assert!(service.get_all().unwrap().is_empty());
}

#[test]
fn add_column_appends_declared_type() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("title", "TEXT").unwrap();
    service.add_column("score", "INTEGER").unwrap();
    let columns = service.list_columns().unwrap();
    assert_eq!(column_names(&service), vec!["id", "title", "score"]);
    assert_eq!(columns[1].declared_type, "TEXT");
    assert_eq!(columns[2].declared_type, "INTEGER");
}

#[test]
fn rename_keeps_position_type_values_and_ids() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("a", "TEXT").unwrap();
    service.add_column("b", "VARCHAR(32)").unwrap();
    service.add_column("c", "INTEGER").unwrap();
    let first = service.insert(&fields(&[("a", "1"), ("b", "two"), ("c", "3")])).unwrap();
    let second = service.insert(&fields(&[("b", "four")])).unwrap();

    service.rename_column("b", "x").unwrap();

    let columns = service.list_columns().unwrap();
    assert_eq!(column_names(&service), vec!["id", "a", "x", "c"]);
    assert_eq!(columns[2].declared_type, "VARCHAR(32)");
    assert!(columns[0].is_primary_key);
    let row = service.get(first).unwrap();
    assert_eq!(row.value("x"), Some("two"));
    assert_eq!(row.value("a"), Some("1"));
    assert_eq!(row.value("c"), Some("3"));
    assert!(!row.fields.contains_key("b"));
    assert_eq!(service.get(second).unwrap().value("x"), Some("four"));
}

#[test]
fn remove_drops_column_and_keeps_other_values() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("keep", "TEXT").unwrap();
    service.add_column("drop_me", "TEXT").unwrap();
    let id = service.insert(&fields(&[("keep", "k"), ("drop_me", "d")])).unwrap();

    service.remove_column("drop_me").unwrap();

    assert_eq!(column_names(&service), vec!["id", "keep"]);
    assert_eq!(service.get(id).unwrap().value("keep"), Some("k"));
    let err = service.insert(&fields(&[("drop_me", "again")])).unwrap_err();
    assert_eq!(err, ServiceError::Store(StoreError::UnknownColumn("drop_me".to_string())));
    let err = service.update(id, &fields(&[("drop_me", "again")])).unwrap_err();
    assert!(err.is_invalid_request());
}

#[test]
fn rebuild_keeps_assigning_fresh_ids() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("a", "TEXT").unwrap();
    service.add_column("b", "TEXT").unwrap();
    let first = service.insert(&fields(&[("a", "1")])).unwrap();
    let second = service.insert(&fields(&[("a", "2")])).unwrap();
    service.remove_column("b").unwrap();
    let third = service.insert(&fields(&[("a", "3")])).unwrap();
    assert!(third > second && second > first);
    assert!(service.list_columns().unwrap()[0].is_primary_key);
}

#[test]
fn identifier_column_cannot_be_changed() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("title", "TEXT").unwrap();
    for err in [
        service.remove_column("id").unwrap_err(),
        service.rename_column("id", "key").unwrap_err(),
        service.rename_column("title", "ID").unwrap_err(),
        service.add_column("id", "TEXT").unwrap_err(),
    ] {
        assert!(matches!(err, ServiceError::Schema(ref schema) if schema.step == SchemaStep::Validate));
    }
    assert_eq!(column_names(&service), vec!["id", "title"]);
}

#[test]
fn injection_shaped_names_and_types_are_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    assert!(service.add_column("x\"; DROP TABLE data_entries; --", "TEXT").is_err());
    assert!(service.add_column("title", "TEXT; DROP TABLE data_entries").is_err());
    assert!(service.add_column("", "TEXT").is_err());
    assert!(service.add_column("1abc", "TEXT").is_err());
    assert_eq!(column_names(&service), vec!["id"]);
}

#[test]
fn constraint_clauses_in_declared_types_are_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    let err = service.add_column("t", "TEXT COLLATE NOCASE").unwrap_err();
    assert!(err.is_invalid_request());
    let err = service.add_column("parent", "INTEGER REFERENCES data_entries").unwrap_err();
    assert!(err.is_invalid_request());
    assert!(service.add_column("t", "TEXT NOT NULL").is_err());
    assert_eq!(column_names(&service), vec!["id"]);

    service.add_column("t", "TEXT").unwrap();
    service.insert(&fields(&[("t", "Apple")])).unwrap();
    service.remove_column("t").unwrap();
    assert_eq!(column_names(&service), vec!["id"]);
}

#[test]
fn unknown_columns_fail_schema_changes() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    let err = service.remove_column("ghost").unwrap_err();
    assert!(err.is_invalid_request());
    let err = service.rename_column("ghost", "spirit").unwrap_err();
    assert!(err.is_invalid_request());
}

// ============================================================================
// SECTION: Rows
// ============================================================================

#[test]
fn insert_and_get_round_trip_with_nulls() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("a", "TEXT").unwrap();
    service.add_column("b", "TEXT").unwrap();
    let id = service.insert(&fields(&[("a", "it's \"quoted\"")])).unwrap();
    let row = service.get(id).unwrap();
    assert_eq!(row.id, id);
    assert_eq!(row.value("a"), Some("it's \"quoted\""));
    assert_eq!(row.fields.get("b"), Some(&None));
    assert!(!row.fields.contains_key("id"));
}

#[test]
fn integer_columns_read_back_as_text() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("n", "INTEGER").unwrap();
    let id = service.insert(&fields(&[("n", "42")])).unwrap();
    assert_eq!(service.get(id).unwrap().value("n"), Some("42"));
}

#[test]
fn get_missing_row_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    let err = service.get(RowId::new(99)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn get_all_returns_rows_in_id_order() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("a", "TEXT").unwrap();
    let ids: Vec<RowId> = ["x", "y", "z"]
        .into_iter()
        .map(|value| service.insert(&fields(&[("a", value)])).unwrap())
        .collect();
    let rows = service.get_all().unwrap();
    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), ids);
}

#[test]
fn update_changes_value_and_logs_once() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("a", "TEXT").unwrap();
    service.add_column("b", "TEXT").unwrap();
    let id = service.insert(&fields(&[("a", "1"), ("b", "keep")])).unwrap();

    let outcome = service.update(id, &fields(&[("a", "2")])).unwrap();

    assert_eq!(outcome.row_id, id);
    assert!(outcome.log_warning.is_none());
    let row = service.get(id).unwrap();
    assert_eq!(row.value("a"), Some("2"));
    assert_eq!(row.value("b"), Some("keep"));
    let changes = service.changes(id).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].row_id, id);
    assert_eq!(changes[0].changed_fields, r#"{"a":"2"}"#);
    assert!(!changes[0].timestamp.is_empty());
}

#[test]
fn update_of_missing_row_is_not_found_and_not_logged() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("a", "TEXT").unwrap();
    let err = service.update(RowId::new(5), &fields(&[("a", "x")])).unwrap_err();
    assert!(err.is_not_found());
    assert!(service.changes(RowId::new(5)).unwrap().is_empty());
}

#[test]
fn update_survives_missing_log_table() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("a", "TEXT").unwrap();
    let id = service.insert(&fields(&[("a", "1")])).unwrap();
    let connection = Connection::open(dir.path().join("dyntable.db")).unwrap();
    connection.execute_batch("DROP TABLE update_log;").unwrap();
    drop(connection);

    let outcome = service.update(id, &fields(&[("a", "2")])).unwrap();

    assert!(outcome.log_warning.is_some());
    assert_eq!(service.get(id).unwrap().value("a"), Some("2"));
}

#[test]
fn concrete_scenario_end_to_end() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);

    service.add_column("title", "TEXT").unwrap();
    let columns = service.list_columns().unwrap();
    assert_eq!(column_names(&service), vec!["id", "title"]);
    assert_eq!(columns[0].declared_type, "INTEGER");
    assert_eq!(columns[1].declared_type, "TEXT");

    let first = service.insert(&fields(&[("title", "Hello")])).unwrap();
    assert_eq!(first, RowId::new(1));

    service.rename_column("title", "name").unwrap();
    let row = service.get(first).unwrap();
    assert_eq!(row.value("name"), Some("Hello"));
    assert_eq!(row.fields.len(), 1);

    service.remove_column("name").unwrap();
    let second = service.insert(&FieldMap::new()).unwrap();
    assert_eq!(second, RowId::new(2));

    let rows = service.get_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, RowId::new(1));
    assert_eq!(rows[1].id, RowId::new(2));
    assert!(rows.iter().all(|row| row.fields.is_empty()));
}

// ============================================================================
// SECTION: Rebuild Failures
// ============================================================================

#[test]
fn atomic_rebuild_failure_rolls_back_everything() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    service.add_column("title", "TEXT").unwrap();
    let id = service.insert(&fields(&[("title", "Hello")])).unwrap();
    pin_row_with_foreign_key(&dir, id.get());

    let err = service.remove_column("title").unwrap_err();

    let ServiceError::Schema(schema) = err else {
        panic!("expected schema error, got {err}");
    };
    assert_eq!(schema.step, SchemaStep::DropOriginal);
    assert!(schema.rolled_back);
    assert_eq!(column_names(&service), vec!["id", "title"]);
    assert_eq!(service.get(id).unwrap().value("title"), Some("Hello"));
    assert!(!table_names(&dir).iter().any(|name| name.contains("rebuild")));
}

#[test]
fn non_atomic_rebuild_failure_leaves_temp_table() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, false);
    service.add_column("title", "TEXT").unwrap();
    let id = service.insert(&fields(&[("title", "Hello")])).unwrap();
    pin_row_with_foreign_key(&dir, id.get());

    let err = service.remove_column("title").unwrap_err();

    let ServiceError::Schema(schema) = err else {
        panic!("expected schema error, got {err}");
    };
    assert_eq!(schema.step, SchemaStep::DropOriginal);
    assert!(!schema.rolled_back);
    assert!(table_names(&dir).contains(&"data_entries_rebuild_title".to_string()));
    assert_eq!(column_names(&service), vec!["id", "title"]);
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

#[test]
fn data_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let service = open_service(&dir, true);
        service.add_column("title", "TEXT").unwrap();
        service.insert(&fields(&[("title", "kept")])).unwrap()
    };
    let service = open_service(&dir, true);
    assert_eq!(service.get(id).unwrap().value("title"), Some("kept"));
}

#[test]
fn list_columns_without_bootstrap_reports_missing_table() {
    let dir = TempDir::new().unwrap();
    let engine = SqliteEngine::open(config_for(&dir, true)).unwrap();
    let service = TableService::new(SharedEngine::from_engine(engine));
    assert_eq!(service.list_columns().unwrap_err().kind(), "catalog");
}

#[test]
fn concurrent_inserts_share_one_engine() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(open_service(&dir, true));
    service.add_column("worker", "TEXT").unwrap();
    let handles: Vec<_> = (0 .. 4)
        .map(|worker| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let label = worker.to_string();
                for _ in 0 .. 10 {
                    service.insert(&fields(&[("worker", label.as_str())])).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(service.get_all().unwrap().len(), 40);
}

#[test]
fn readiness_succeeds_on_open_database() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, true);
    assert!(service.readiness().is_ok());
}
