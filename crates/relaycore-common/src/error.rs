//! Centralized error taxonomy for relaycore.
//!
//! Uses `thiserror` for ergonomic error definitions and provides HTTP-friendly
//! error variants that convert directly to API responses. One variant per row
//! of the service's error taxonomy table: every variant owns one HTTP status
//! and one short machine-readable code; infrastructure errors never leak
//! their text to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// Core application error type used across relaycore.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // === Admission ===
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    // === Shape / parse errors ===
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("invite schema mismatch")]
    InviteSchemaMismatch,

    #[error("invite envelope invalid")]
    InviteEnvelopeInvalid,

    #[error("invalid wrapped payload")]
    InvalidWrappedPayload,

    #[error("invalid wrap context")]
    InvalidWrapContext,

    // === Not found ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("one-time prekey missing")]
    PrekeyUnavailable,

    // === Monotonicity / single-use conflicts ===
    #[error("replay detected")]
    Replay { last_ctr: i64 },

    #[error("counter too low")]
    CounterTooLow { max_counter: i64 },

    #[error("conflict")]
    Conflict,

    #[error("invite already exists")]
    InviteAlreadyExists,

    #[error("invite already delivered")]
    InviteAlreadyDelivered { delivered_at: Option<i64> },

    #[error("token already used")]
    TokenUsed {
        used_at: Option<i64>,
        used_by_digest: Option<String>,
    },

    #[error("contact secrets backup rejected")]
    ContactSecretsBackupRejected,

    // === Time-bounded ===
    #[error("expired")]
    Expired,

    // === Infrastructure ===
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema missing: {0}")]
    SchemaMissing(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl RelayError {
    /// Map error to HTTP status code, per the taxonomy table.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest { .. }
            | Self::InviteSchemaMismatch
            | Self::InviteEnvelopeInvalid
            | Self::InvalidWrappedPayload
            | Self::InvalidWrapContext => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::PrekeyUnavailable => StatusCode::NOT_FOUND,
            Self::Replay { .. }
            | Self::CounterTooLow { .. }
            | Self::Conflict
            | Self::InviteAlreadyExists
            | Self::InviteAlreadyDelivered { .. }
            | Self::TokenUsed { .. }
            | Self::ContactSecretsBackupRejected => StatusCode::CONFLICT,
            Self::Expired => StatusCode::GONE,
            Self::Database(_) | Self::SchemaMissing(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable error code, per the taxonomy table.
    pub fn error_code(&self) -> &str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::BadRequest { .. } => "BadRequest",
            Self::InviteSchemaMismatch => "InviteSchemaMismatch",
            Self::InviteEnvelopeInvalid => "InviteEnvelopeInvalid",
            Self::InvalidWrappedPayload => "InvalidWrappedPayload",
            Self::InvalidWrapContext => "InvalidWrapContext",
            Self::NotFound { .. } => "NotFound",
            Self::PrekeyUnavailable => "PrekeyUnavailable",
            Self::Replay { .. } => "Replay",
            Self::CounterTooLow { .. } => "CounterTooLow",
            Self::Conflict => "Conflict",
            Self::InviteAlreadyExists => "InviteAlreadyExists",
            Self::InviteAlreadyDelivered { .. } => "InviteAlreadyDelivered",
            Self::TokenUsed { .. } => "TokenUsed",
            Self::ContactSecretsBackupRejected => "ContactSecretsBackupRejected",
            Self::Expired => "Expired",
            Self::Database(_) => "Internal",
            Self::SchemaMissing(_) => "SchemaMissing",
            Self::Internal(_) => "Internal",
        }
    }

    /// Structured recovery data clients rely on to reconcile ratchet/subscription state.
    fn details(&self) -> Option<Value> {
        match self {
            Self::Replay { last_ctr } => Some(serde_json::json!({ "lastCtr": last_ctr })),
            Self::CounterTooLow { max_counter } => {
                Some(serde_json::json!({ "maxCounter": max_counter }))
            }
            Self::InviteAlreadyDelivered { delivered_at } => {
                Some(serde_json::json!({ "deliveredAt": delivered_at }))
            }
            Self::TokenUsed {
                used_at,
                used_by_digest,
            } => Some(serde_json::json!({
                "usedAt": used_at,
                "usedByDigest": used_by_digest,
            })),
            _ => None,
        }
    }
}

/// Truncate a message to at most `max` chars so infrastructure errors
/// never cross the boundary verbatim.
fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        message.to_string()
    } else {
        message.chars().take(max).collect()
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = self.details();

        let message = match &self {
            RelayError::Database(e) => {
                tracing::error!("database error: {e}");
                "an internal error occurred".to_string()
            }
            RelayError::SchemaMissing(names) => {
                tracing::error!("schema missing: {names}");
                truncate(&format!("schema missing: {names}"), 200)
            }
            RelayError::Internal(e) => {
                tracing::error!("internal error: {e}");
                "an internal error occurred".to_string()
            }
            other => truncate(&other.to_string(), 200),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message,
            details,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Inspect a database error for a unique/primary-key violation and remap it
/// to the domain conflict supplied by the caller. Falls back to substring
/// matching on the driver's message when no structured code is available.
pub fn map_unique_violation(err: sqlx::Error, on_conflict: RelayError) -> RelayError {
    if is_unique_violation(&err) {
        return on_conflict;
    }
    RelayError::Database(err)
}

/// `true` iff `err` is a unique/primary-key violation, by structured driver
/// code first and message substring ("unique"/"primary") as fallback.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.is_unique_violation() {
            return true;
        }
        let msg = db_err.message().to_ascii_lowercase();
        if msg.contains("unique") || msg.contains("primary") {
            return true;
        }
    }
    false
}

/// Convenience type alias for Results using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;
