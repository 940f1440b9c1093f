// crates/dyntable-server/src/server/tests.rs
// ============================================================================
// Module: Dyntable Server Unit Tests
// Description: Handler, status mapping, and audit behavior.
// Purpose: Validate handlers against a temporary SQLite database.
// Dependencies: dyntable-server, dyntable-store-sqlite
// ============================================================================

//! ## Overview
//! Calls handlers directly with shared state and inspects the JSON bodies.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only handler assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Bytes;
use axum::body::to_bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use dyntable_core::ColumnDescriptor;
use dyntable_core::EngineError;
use dyntable_core::ExecOutcome;
use dyntable_core::SharedEngine;
use dyntable_core::SqlEngine;
use dyntable_core::SqlStatement;
use dyntable_core::TableService;
use dyntable_core::TextRow;
use dyntable_store_sqlite::SqliteEngine;
use dyntable_store_sqlite::SqliteStoreConfig;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

use super::AppState;
use super::handle_add_column;
use super::handle_get_entry;
use super::handle_health;
use super::handle_insert_entry;
use super::handle_list_changes;
use super::handle_list_columns;
use super::handle_list_entries;
use super::handle_remove_column;
use super::handle_rename_column;
use super::handle_update_entry;
use crate::audit::AuditSink;
use crate::audit::ChangeLogWarningEvent;
use crate::audit::HttpRequestEvent;
use crate::audit::SchemaChangeEvent;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingAuditSink {
    schema: Mutex<Vec<SchemaChangeEvent>>,
    warnings: Mutex<Vec<ChangeLogWarningEvent>>,
}

impl AuditSink for RecordingAuditSink {
    fn record_request(&self, _event: &HttpRequestEvent) {}

    fn record_schema(&self, event: &SchemaChangeEvent) {
        self.schema.lock().unwrap().push(event.clone());
    }

    fn record_change_log_warning(&self, event: &ChangeLogWarningEvent) {
        self.warnings.lock().unwrap().push(event.clone());
    }
}

struct Fixture {
    _dir: TempDir,
    state: Arc<AppState>,
    audit: Arc<RecordingAuditSink>,
}

fn fixture() -> Fixture {
    fixture_with_limit(1024 * 1024)
}

fn fixture_with_limit(max_body_bytes: usize) -> Fixture {
    let dir = TempDir::new().unwrap();
    let engine = SqliteEngine::open(SqliteStoreConfig::for_path(dir.path().join("server.db")))
        .expect("open engine");
    let service = TableService::open(SharedEngine::from_engine(engine)).expect("bootstrap");
    let audit = Arc::new(RecordingAuditSink::default());
    let sink: Arc<dyn AuditSink> = Arc::clone(&audit) as Arc<dyn AuditSink>;
    let state =
        Arc::new(AppState::new(service, sink, max_body_bytes, Duration::from_millis(500)));
    Fixture {
        _dir: dir,
        state,
        audit,
    }
}

struct DownEngine;

impl SqlEngine for DownEngine {
    fn execute(&self, _statement: &SqlStatement) -> Result<ExecOutcome, EngineError> {
        Err(EngineError::Unavailable("closed".to_string()))
    }

    fn query(&self, _statement: &SqlStatement) -> Result<Vec<TextRow>, EngineError> {
        Err(EngineError::Unavailable("closed".to_string()))
    }

    fn table_columns(&self, _table: &str) -> Result<Vec<ColumnDescriptor>, EngineError> {
        Err(EngineError::Unavailable("closed".to_string()))
    }

    fn readiness(&self) -> Result<(), EngineError> {
        Err(EngineError::Unavailable("closed".to_string()))
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_body(value: &Value) -> Bytes {
    Bytes::from(serde_json::to_vec(value).unwrap())
}

fn column_names(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|column| column["name"].as_str().unwrap().to_string())
        .collect()
}

async fn add_column(state: &Arc<AppState>, name: &str) -> Response {
    handle_add_column(State(Arc::clone(state)), json_body(&json!({"name": name, "type": "TEXT"})))
        .await
        .into_response()
}

// ============================================================================
// SECTION: Health
// ============================================================================

#[tokio::test]
async fn health_reports_up_for_open_database() {
    let fixture = fixture();
    let response = handle_health(State(Arc::clone(&fixture.state))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "up");
}

#[tokio::test]
async fn health_reports_down_when_engine_is_unreachable() {
    let service = TableService::new(SharedEngine::from_engine(DownEngine));
    let state = Arc::new(AppState::new(
        service,
        Arc::new(RecordingAuditSink::default()),
        1024,
        Duration::from_millis(500),
    ));
    let response = handle_health(State(state)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "down");
    assert!(body["error"].as_str().unwrap().contains("closed"));
}

// ============================================================================
// SECTION: Columns
// ============================================================================

#[tokio::test]
async fn add_rename_remove_column_return_updated_lists() {
    let fixture = fixture();
    let state = &fixture.state;

    let response = add_column(state, "title").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(column_names(&body_json(response).await), vec!["id", "title"]);

    let response = handle_rename_column(
        State(Arc::clone(state)),
        Path("title".to_string()),
        json_body(&json!({"new_name": "heading"})),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(column_names(&body_json(response).await), vec!["id", "heading"]);

    let response = handle_remove_column(State(Arc::clone(state)), Path("heading".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(column_names(&body_json(response).await), vec!["id"]);

    let events = fixture.audit.schema.lock().unwrap();
    let operations: Vec<&str> = events.iter().map(|event| event.operation).collect();
    assert_eq!(operations, vec!["add_column", "rename_column", "remove_column"]);
    assert!(events.iter().all(|event| event.succeeded));
}

#[tokio::test]
async fn invalid_column_name_is_bad_request_and_audited() {
    let fixture = fixture();
    let response = add_column(&fixture.state, "bad name;").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["kind"], "invalid");

    let events = fixture.audit.schema.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].succeeded);
    assert_eq!(events[0].step, Some("validate"));
}

#[tokio::test]
async fn removing_identifier_column_is_rejected() {
    let fixture = fixture();
    let response = handle_remove_column(State(Arc::clone(&fixture.state)), Path("id".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = handle_list_columns(State(Arc::clone(&fixture.state))).await.into_response();
    assert_eq!(column_names(&body_json(response).await), vec!["id"]);
}

#[tokio::test]
async fn malformed_and_oversized_bodies_are_rejected() {
    let fixture = fixture_with_limit(16);
    let response = handle_add_column(State(Arc::clone(&fixture.state)), Bytes::from_static(b"{"))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = add_column(&fixture.state, "a_rather_long_column_name").await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(fixture.audit.schema.lock().unwrap().is_empty());
}

// ============================================================================
// SECTION: Entries
// ============================================================================

#[tokio::test]
async fn entry_lifecycle_records_history() {
    let fixture = fixture();
    let state = &fixture.state;
    add_column(state, "title").await;
    add_column(state, "body").await;

    let response =
        handle_insert_entry(State(Arc::clone(state)), json_body(&json!({"title": "Hello"})))
            .await
            .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_i64().unwrap();
    assert_eq!(id, 1);

    let response = handle_update_entry(
        State(Arc::clone(state)),
        Path(id.to_string()),
        json_body(&json!({"body": "World"})),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert!(body["log_warning"].is_null());

    let response = handle_get_entry(State(Arc::clone(state)), Path(id.to_string()))
        .await
        .into_response();
    assert_eq!(body_json(response).await, json!({"id": 1, "title": "Hello", "body": "World"}));

    let response = handle_list_entries(State(Arc::clone(state))).await.into_response();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = handle_list_changes(State(Arc::clone(state)), Path(id.to_string()))
        .await
        .into_response();
    let changes = body_json(response).await;
    let changes = changes.as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["row_id"], 1);
    assert_eq!(changes[0]["changed_fields"], json!({"body": "World"}));
    assert!(fixture.audit.warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_entry_is_not_found() {
    let fixture = fixture();
    add_column(&fixture.state, "title").await;
    let response = handle_get_entry(State(Arc::clone(&fixture.state)), Path("42".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["kind"], "not_found");

    let response = handle_update_entry(
        State(Arc::clone(&fixture.state)),
        Path("42".to_string()),
        json_body(&json!({"title": "x"})),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(fixture.audit.warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_columns_and_bad_ids_are_bad_requests() {
    let fixture = fixture();
    let response =
        handle_insert_entry(State(Arc::clone(&fixture.state)), json_body(&json!({"ghost": "x"})))
            .await
            .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = handle_get_entry(State(Arc::clone(&fixture.state)), Path("abc".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = handle_insert_entry(State(Arc::clone(&fixture.state)), json_body(&json!([1])))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_for_row_without_updates_is_empty() {
    let fixture = fixture();
    let response = handle_list_changes(State(Arc::clone(&fixture.state)), Path("7".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

// ============================================================================
// SECTION: Schema Lock
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_schema_change_keeps_readers_out_until_it_finishes() {
    let fixture = fixture();
    let finished = Arc::new(AtomicBool::new(false));

    let writer_done = Arc::clone(&finished);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        fixture.state.write(move |_| {
            std::thread::sleep(Duration::from_millis(500));
            writer_done.store(true, Ordering::SeqCst);
            Ok(())
        }),
    )
    .await;
    assert!(abandoned.is_err(), "write should still be running after the timeout");

    let reader_saw = Arc::clone(&finished);
    let seen =
        fixture.state.read(move |_| Ok(reader_saw.load(Ordering::SeqCst))).await.unwrap();
    assert!(seen, "read ran while the schema change was still in progress");
}
