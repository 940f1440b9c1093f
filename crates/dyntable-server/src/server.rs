// crates/dyntable-server/src/server.rs
// ============================================================================
// Module: Dyntable HTTP Server
// Description: axum router, handlers, and lifecycle for the table service.
// Purpose: Expose columns, entries, and change history over JSON/HTTP.
// Dependencies: dyntable-core, dyntable-config, dyntable-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! Handlers are thin: they decode the request, run the synchronous
//! [`TableService`] call on the blocking pool, and encode the result. Schema
//! changes take the write side of a schema lock; row and catalog reads take
//! the read side, so no row operation can interleave with a rebuild.
//!
//! Shutdown is graceful: once the shutdown future resolves, the listener
//! stops accepting connections and in-flight requests get
//! `server.shutdown_grace_ms` to finish before the server task is aborted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::MatchedPath;
use axum::extract::Path;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::patch;
use dyntable_config::DyntableConfig;
use dyntable_core::FieldMap;
use dyntable_core::ServiceError;
use dyntable_core::SharedEngine;
use dyntable_core::TableService;
use dyntable_store_sqlite::SqliteEngine;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::sync::RwLock;

use crate::api::AddColumnRequest;
use crate::api::ApiError;
use crate::api::RenameColumnRequest;
use crate::api::change_json;
use crate::api::fields_from_json;
use crate::api::parse_body;
use crate::api::parse_row_id;
use crate::api::row_json;
use crate::audit::AuditSink;
use crate::audit::ChangeLogWarningEvent;
use crate::audit::HttpRequestEvent;
use crate::audit::LifecycleEvent;
use crate::audit::SchemaChangeEvent;
use crate::audit::audit_sink_from_config;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Dyntable HTTP server instance.
pub struct DyntableServer {
    /// Validated configuration.
    config: DyntableConfig,
    /// Shared handler state.
    state: Arc<AppState>,
}

impl DyntableServer {
    /// Opens the database and builds the server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration, audit sink, or database
    /// initialization fails.
    pub fn from_config(config: DyntableConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit =
            audit_sink_from_config(&config.audit).map_err(|err| ServerError::Init(err.to_string()))?;
        let engine = SqliteEngine::open(config.store.sqlite_config())
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let service = TableService::open(SharedEngine::from_engine(engine))
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let state = Arc::new(AppState::new(
            service,
            audit,
            config.server.max_body_bytes,
            Duration::from_millis(config.server.health_timeout_ms),
        ));
        Ok(Self {
            config,
            state,
        })
    }

    /// Returns the router serving this instance.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the server fails.
    pub async fn serve_listener(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let bind = listener
            .local_addr()
            .map_or_else(|_| self.config.server.bind.clone(), |addr| addr.to_string());
        let grace = Duration::from_millis(self.config.server.shutdown_grace_ms);
        let audit = Arc::clone(&self.state.audit);
        let app = self.router();
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move { stop_signal.notified().await })
                .await
        });
        audit.record_lifecycle(&LifecycleEvent::new("start", bind.clone()));

        tokio::select! {
            result = &mut server => {
                return flatten_server_result(result);
            }
            () = shutdown => {}
        }
        stop.notify_one();
        if let Ok(result) = tokio::time::timeout(grace, &mut server).await {
            audit.record_lifecycle(&LifecycleEvent::new("shutdown", bind));
            flatten_server_result(result)
        } else {
            server.abort();
            audit.record_lifecycle(&LifecycleEvent::new("shutdown_forced", bind));
            Ok(())
        }
    }
}

/// Collapses the server task result.
fn flatten_server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(ServerError::Transport(format!("http server failed: {err}"))),
        Err(err) => Err(ServerError::Transport(format!("http server task failed: {err}"))),
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for HTTP handlers.
pub(crate) struct AppState {
    /// Table service facade.
    pub(crate) service: TableService,
    /// Schema lock: writers are schema changes, readers are everything else.
    pub(crate) schema_lock: Arc<RwLock<()>>,
    /// Audit sink.
    pub(crate) audit: Arc<dyn AuditSink>,
    /// Maximum accepted request body size.
    pub(crate) max_body_bytes: usize,
    /// Liveness probe timeout.
    pub(crate) health_timeout: Duration,
}

impl AppState {
    /// Builds handler state.
    pub(crate) fn new(
        service: TableService,
        audit: Arc<dyn AuditSink>,
        max_body_bytes: usize,
        health_timeout: Duration,
    ) -> Self {
        Self {
            service,
            schema_lock: Arc::new(RwLock::new(())),
            audit,
            max_body_bytes,
            health_timeout,
        }
    }

    /// Runs a row or catalog call under the shared side of the schema lock.
    ///
    /// The guard moves into the blocking task, so the lock is held until the
    /// call returns even if the request future is dropped.
    pub(crate) async fn read<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&TableService) -> Result<T, ServiceError> + Send + 'static,
    {
        let guard = Arc::clone(&self.schema_lock).read_owned().await;
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = call(&service);
            drop(guard);
            outcome
        })
        .await
        .map_err(|err| ApiError::internal(format!("worker failed: {err}")))?
        .map_err(ApiError::from)
    }

    /// Runs a schema change under the exclusive side of the schema lock.
    ///
    /// The service outcome is returned unconverted so it can be audited. The
    /// guard is held by the blocking task for the whole rebuild.
    pub(crate) async fn write<T, F>(&self, call: F) -> Result<Result<T, ServiceError>, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&TableService) -> Result<T, ServiceError> + Send + 'static,
    {
        let guard = Arc::clone(&self.schema_lock).write_owned().await;
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = call(&service);
            drop(guard);
            outcome
        })
        .await
        .map_err(|err| ApiError::internal(format!("worker failed: {err}")))
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the HTTP router over shared state.
pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/columns", get(handle_list_columns).post(handle_add_column))
        .route(
            "/api/columns/{name}",
            patch(handle_rename_column).delete(handle_remove_column),
        )
        .route("/api/entries", get(handle_list_entries).post(handle_insert_entry))
        .route("/api/entries/{id}", get(handle_get_entry).patch(handle_update_entry))
        .route("/api/changes/{id}", get(handle_list_changes))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record_request))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Emits one `http_request` audit event per response.
async fn record_request(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |path| path.as_str().to_string());
    let response = next.run(request).await;
    state.audit.record_request(&HttpRequestEvent::new(
        method,
        route,
        response.status().as_u16(),
        started.elapsed().as_millis(),
    ));
    response
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /health`: probes the database within the configured timeout.
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    let service = state.service.clone();
    let probe = tokio::task::spawn_blocking(move || service.readiness());
    let failure = match tokio::time::timeout(state.health_timeout, probe).await {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(err))) => Some(err.to_string()),
        Ok(Err(err)) => Some(format!("health probe failed: {err}")),
        Err(_) => Some("health probe timed out".to_string()),
    };
    match failure {
        None => (StatusCode::OK, Json(json!({"status": "up", "message": "database is reachable"})))
            .into_response(),
        Some(error) => {
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "down", "error": error})))
                .into_response()
        }
    }
}

/// `GET /api/columns`.
pub(crate) async fn handle_list_columns(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let columns = state.read(TableService::list_columns).await?;
    Ok(Json(columns).into_response())
}

/// `POST /api/columns` with `{"name","type"}`.
pub(crate) async fn handle_add_column(
    State(state): State<Arc<AppState>>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    let request: AddColumnRequest = parse_body(&bytes, state.max_body_bytes)?;
    let event = SchemaChangeEvent::new("add_column", request.name.clone(), None);
    let result = state
        .write(move |service| {
            service.add_column(&request.name, &request.declared_type)?;
            service.list_columns()
        })
        .await?;
    let columns = audit_schema_change(&state, event, result)?;
    Ok((StatusCode::CREATED, Json(columns)).into_response())
}

/// `PATCH /api/columns/{name}` with `{"new_name"}`.
pub(crate) async fn handle_rename_column(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    let request: RenameColumnRequest = parse_body(&bytes, state.max_body_bytes)?;
    let event =
        SchemaChangeEvent::new("rename_column", name.clone(), Some(request.new_name.clone()));
    let result = state
        .write(move |service| {
            service.rename_column(&name, &request.new_name)?;
            service.list_columns()
        })
        .await?;
    let columns = audit_schema_change(&state, event, result)?;
    Ok(Json(columns).into_response())
}

/// `DELETE /api/columns/{name}`.
pub(crate) async fn handle_remove_column(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let event = SchemaChangeEvent::new("remove_column", name.clone(), None);
    let result = state
        .write(move |service| {
            service.remove_column(&name)?;
            service.list_columns()
        })
        .await?;
    let columns = audit_schema_change(&state, event, result)?;
    Ok(Json(columns).into_response())
}

/// `GET /api/entries`.
pub(crate) async fn handle_list_entries(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let rows = state.read(TableService::get_all).await?;
    let body: Vec<Value> = rows.iter().map(row_json).collect();
    Ok(Json(body).into_response())
}

/// `GET /api/entries/{id}`.
pub(crate) async fn handle_get_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_row_id(&id)?;
    let row = state.read(move |service| service.get(id)).await?;
    Ok(Json(row_json(&row)).into_response())
}

/// `POST /api/entries` with a flat field object.
pub(crate) async fn handle_insert_entry(
    State(state): State<Arc<AppState>>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    let fields = parse_fields(&bytes, state.max_body_bytes)?;
    let id = state.read(move |service| service.insert(&fields)).await?;
    Ok((StatusCode::CREATED, Json(json!({"id": id.get()}))).into_response())
}

/// `PATCH /api/entries/{id}` with a flat field object.
pub(crate) async fn handle_update_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    let id = parse_row_id(&id)?;
    let fields = parse_fields(&bytes, state.max_body_bytes)?;
    let outcome = state.read(move |service| service.update(id, &fields)).await?;
    let log_warning = outcome.log_warning.map(|err| err.to_string());
    if let Some(warning) = &log_warning {
        state
            .audit
            .record_change_log_warning(&ChangeLogWarningEvent::new(id.get(), warning.clone()));
    }
    Ok(Json(json!({"id": outcome.row_id.get(), "log_warning": log_warning})).into_response())
}

/// `GET /api/changes/{id}`.
pub(crate) async fn handle_list_changes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_row_id(&id)?;
    let entries = state.read(move |service| service.changes(id)).await?;
    let body: Vec<Value> = entries.iter().map(change_json).collect();
    Ok(Json(body).into_response())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses an entry body into a field map.
fn parse_fields(bytes: &[u8], max_body_bytes: usize) -> Result<FieldMap, ApiError> {
    let value: Value = parse_body(bytes, max_body_bytes)?;
    fields_from_json(value)
}

/// Records the schema change outcome and converts errors for the response.
fn audit_schema_change<T>(
    state: &AppState,
    mut event: SchemaChangeEvent,
    result: Result<T, ServiceError>,
) -> Result<T, ApiError> {
    if let Err(err) = &result {
        event.succeeded = false;
        event.error = Some(err.to_string());
        if let ServiceError::Schema(schema) = err {
            event.step = Some(schema.step.as_str());
            event.rolled_back = Some(schema.rolled_back);
        }
    }
    state.audit.record_schema(&event);
    result.map_err(ApiError::from)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
