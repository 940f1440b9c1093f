// crates/dyntable-server/src/api.rs
// ============================================================================
// Module: Dyntable HTTP API Types
// Description: Request bodies, response shaping, and error mapping.
// Purpose: Translate between JSON payloads and table service calls.
// Dependencies: dyntable-core, axum, serde, serde_json
// ============================================================================

//! ## Overview
//! Errors are returned as `{"error":{"kind":..,"message":..}}`. Missing rows
//! map to 404, malformed requests to 400, an unreachable engine to 503, and
//! every other failure to 500. Rows are rendered as flat objects with a
//! numeric `id` and text-or-null columns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use dyntable_core::ChangeLogEntry;
use dyntable_core::FieldMap;
use dyntable_core::IdentifierError;
use dyntable_core::Row;
use dyntable_core::RowId;
use dyntable_core::ServiceError;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Body of `POST /api/columns`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddColumnRequest {
    /// New column name.
    pub name: String,
    /// Declared column type.
    #[serde(rename = "type")]
    pub declared_type: String,
}

/// Body of `PATCH /api/columns/{name}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameColumnRequest {
    /// Replacement column name.
    pub new_name: String,
}

/// Parses a JSON body under the configured size limit.
///
/// # Errors
///
/// Returns 413 for oversized bodies and 400 for malformed JSON.
pub fn parse_body<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
    max_body_bytes: usize,
) -> Result<T, ApiError> {
    if bytes.len() > max_body_bytes {
        return Err(ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            format!("request body exceeds {max_body_bytes} bytes"),
        ));
    }
    serde_json::from_slice(bytes).map_err(|err| ApiError::bad_request(err.to_string()))
}

/// Converts a JSON object into a field map. Strings pass through; numbers and
/// booleans are rendered as text.
///
/// # Errors
///
/// Returns 400 when the body is not an object or holds nested values or nulls.
pub fn fields_from_json(value: Value) -> Result<FieldMap, ApiError> {
    let Value::Object(object) = value else {
        return Err(ApiError::bad_request("entry body must be a JSON object"));
    };
    object
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            Value::Number(number) => Ok((key, number.to_string())),
            Value::Bool(flag) => Ok((key, flag.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => Err(ApiError::bad_request(
                format!("field {key} must be a string, number, or boolean"),
            )),
        })
        .collect()
}

/// Parses a row identifier path segment.
///
/// # Errors
///
/// Returns 400 when the segment is not an integer.
pub fn parse_row_id(raw: &str) -> Result<RowId, ApiError> {
    raw.parse().map_err(|err: IdentifierError| ApiError::bad_request(err.to_string()))
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Renders a row as a flat JSON object.
#[must_use]
pub fn row_json(row: &Row) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::from(row.id.get()));
    for (name, value) in &row.fields {
        object.insert(name.clone(), value.clone().map_or(Value::Null, Value::String));
    }
    Value::Object(object)
}

/// Renders a change log entry with its field map decoded.
#[must_use]
pub fn change_json(entry: &ChangeLogEntry) -> Value {
    let changed_fields = serde_json::from_str::<Value>(&entry.changed_fields)
        .unwrap_or_else(|_| Value::String(entry.changed_fields.clone()));
    json!({
        "row_id": entry.row_id.get(),
        "timestamp": entry.timestamp,
        "changed_fields": changed_fields,
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Stable error category.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Creates an error response.
    #[must_use]
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// Creates a 400 response.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid", message)
    }

    /// Creates a 500 response.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        let message = error.to_string();
        if error.is_not_found() {
            return Self::new(StatusCode::NOT_FOUND, "not_found", message);
        }
        if error.is_invalid_request() {
            return Self::bad_request(message);
        }
        let status = match error {
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.kind(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "kind": self.kind,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
