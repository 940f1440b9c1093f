// crates/dyntable-server/src/audit.rs
// ============================================================================
// Module: Dyntable Audit Logging
// Description: Structured audit events for requests and schema changes.
// Purpose: Emit JSON-lines operational logs without a logging framework.
// Dependencies: dyntable-config, serde, serde_json
// ============================================================================

//! ## Overview
//! Every event is one JSON object per line carrying an `event` label and a
//! millisecond timestamp. Sinks write to stderr, append to a file, or discard.
//! Row values never appear in events; only column names and outcomes do.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use dyntable_config::AuditConfig;
use dyntable_config::AuditSinkKind;
use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Returns the current time in milliseconds since the epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// One handled HTTP request.
#[derive(Debug, Clone, Serialize)]
pub struct HttpRequestEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP method.
    pub method: String,
    /// Matched route template, or the raw path when unmatched.
    pub route: String,
    /// Response status code.
    pub status: u16,
    /// Handling time in milliseconds.
    pub duration_ms: u128,
}

impl HttpRequestEvent {
    /// Creates a request event stamped with the current time.
    #[must_use]
    pub fn new(method: String, route: String, status: u16, duration_ms: u128) -> Self {
        Self {
            event: "http_request",
            timestamp_ms: now_ms(),
            method,
            route,
            status,
            duration_ms,
        }
    }
}

/// Outcome of one schema operation.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaChangeEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation label (`add_column`, `rename_column`, `remove_column`).
    pub operation: &'static str,
    /// Column the operation targeted.
    pub column: String,
    /// New column name for renames.
    pub new_name: Option<String>,
    /// Whether the operation succeeded.
    pub succeeded: bool,
    /// Failing step label.
    pub step: Option<&'static str>,
    /// Whether a failed rebuild was rolled back.
    pub rolled_back: Option<bool>,
    /// Failure message.
    pub error: Option<String>,
}

impl SchemaChangeEvent {
    /// Creates a schema change event stamped with the current time.
    #[must_use]
    pub fn new(operation: &'static str, column: String, new_name: Option<String>) -> Self {
        Self {
            event: "schema_change",
            timestamp_ms: now_ms(),
            operation,
            column,
            new_name,
            succeeded: true,
            step: None,
            rolled_back: None,
            error: None,
        }
    }
}

/// Change log append that failed after a committed update.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeLogWarningEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Updated row identifier.
    pub row_id: i64,
    /// Failure message.
    pub error: String,
}

impl ChangeLogWarningEvent {
    /// Creates a warning event stamped with the current time.
    #[must_use]
    pub fn new(row_id: i64, error: String) -> Self {
        Self {
            event: "change_log_warning",
            timestamp_ms: now_ms(),
            row_id,
            error,
        }
    }
}

/// Server start or stop.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Lifecycle phase (`start`, `shutdown`, `shutdown_forced`).
    pub phase: &'static str,
    /// Listening address.
    pub bind: String,
}

impl LifecycleEvent {
    /// Creates a lifecycle event stamped with the current time.
    #[must_use]
    pub fn new(phase: &'static str, bind: String) -> Self {
        Self {
            event: "server_lifecycle",
            timestamp_ms: now_ms(),
            phase,
            bind,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for server events.
pub trait AuditSink: Send + Sync {
    /// Record a handled request.
    fn record_request(&self, event: &HttpRequestEvent);

    /// Record a schema change attempt.
    fn record_schema(&self, _event: &SchemaChangeEvent) {}

    /// Record a change log failure.
    fn record_change_log_warning(&self, _event: &ChangeLogWarningEvent) {}

    /// Record a lifecycle transition.
    fn record_lifecycle(&self, _event: &LifecycleEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one event line to stderr.
    fn emit(event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_request(&self, event: &HttpRequestEvent) {
        Self::emit(event);
    }

    fn record_schema(&self, event: &SchemaChangeEvent) {
        Self::emit(event);
    }

    fn record_change_log_warning(&self, event: &ChangeLogWarningEvent) {
        Self::emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleEvent) {
        Self::emit(event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends and flushes one event line.
    fn emit(&self, event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_request(&self, event: &HttpRequestEvent) {
        self.emit(event);
    }

    fn record_schema(&self, event: &SchemaChangeEvent) {
        self.emit(event);
    }

    fn record_change_log_warning(&self, event: &ChangeLogWarningEvent) {
        self.emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_request(&self, _event: &HttpRequestEvent) {}
}

/// Builds the sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the file sink cannot open its log file.
pub fn audit_sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    match (config.sink, config.path.as_deref()) {
        (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
        (AuditSinkKind::File, Some(path)) => Ok(Arc::new(FileAuditSink::new(Path::new(path))?)),
        (AuditSinkKind::File, None) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "audit.path is required"))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use dyntable_config::AuditConfig;
    use dyntable_config::AuditSinkKind;
    use tempfile::TempDir;

    use super::AuditSink;
    use super::FileAuditSink;
    use super::HttpRequestEvent;
    use super::SchemaChangeEvent;
    use super::audit_sink_from_config;

    #[test]
    fn file_sink_appends_one_json_line_per_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record_request(&HttpRequestEvent::new(
            "GET".to_string(),
            "/api/columns".to_string(),
            200,
            3,
        ));
        let mut event = SchemaChangeEvent::new("remove_column", "title".to_string(), None);
        event.succeeded = false;
        event.step = Some("drop_original");
        sink.record_schema(&event);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "http_request");
        assert_eq!(lines[0]["route"], "/api/columns");
        assert_eq!(lines[1]["event"], "schema_change");
        assert_eq!(lines[1]["step"], "drop_original");
    }

    #[test]
    fn file_sink_without_path_is_rejected() {
        let config = AuditConfig {
            sink: AuditSinkKind::File,
            path: None,
        };
        assert!(audit_sink_from_config(&config).is_err());
    }
}
