//! API error types and responses.
//!
//! | Error | Status | Code |
//! |-------|--------|------|
//! | insufficient credits | 429 | `insufficient_credits` |
//! | unknown account | 404 | `not_found` |
//! | query validation | 400 | validator code (`missing_filter`, ...) |
//! | no backend selected | 409 | `no_backend_selected` |
//! | provider 4xx | 422 | `provider_rejected` |
//! | provider 5xx | 502 | `provider_error` |
//! | transport | 502 / 504 | `upstream_unavailable` / `upstream_timeout` |
//! | storage, corrupt record | 500 | `internal_error` |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use quill_core::{IdError, LedgerError, SelectionError};
use quill_proxy::{ExecutionError, ValidationError};
use quill_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No credit left for the action.
    #[error("{message}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// User-facing explanation.
        message: String,
    },

    /// Query proxy request rejected by the validator.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The query proxy needs a backend selection first.
    #[error("no backend project selected")]
    NoBackendSelected,

    /// The stored backend selection is unusable.
    #[error("invalid backend configuration: {0}")]
    InvalidBackend(String),

    /// The backend provider answered with an error.
    #[error("provider returned {status}: {message}")]
    Provider {
        /// Provider HTTP status.
        status: u16,
        /// Provider error code.
        code: Option<String>,
        /// Provider message (credential-free).
        message: String,
    },

    /// The backend provider could not be reached.
    #[error("{message}")]
    Upstream {
        /// Description of the failure.
        message: String,
        /// Whether the deadline expired.
        timed_out: bool,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InsufficientCredits { balance, message } => (
                StatusCode::TOO_MANY_REQUESTS,
                "insufficient_credits",
                message.clone(),
                Some(serde_json::json!({ "balance": balance })),
            ),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.code(), err.to_string(), None),
            Self::NoBackendSelected => (
                StatusCode::CONFLICT,
                "no_backend_selected",
                "Select a backend project before running queries".to_string(),
                None,
            ),
            Self::InvalidBackend(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_backend",
                msg.clone(),
                None,
            ),
            Self::Provider {
                status,
                code,
                message,
            } => {
                let details = Some(serde_json::json!({
                    "provider_status": status,
                    "provider_code": code,
                }));
                if (400..500).contains(status) {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "provider_rejected",
                        message.clone(),
                        details,
                    )
                } else {
                    (
                        StatusCode::BAD_GATEWAY,
                        "provider_error",
                        message.clone(),
                        details,
                    )
                }
            }
            Self::Upstream { message, timed_out } => {
                let details = Some(serde_json::json!({ "retryable": true }));
                if *timed_out {
                    (
                        StatusCode::GATEWAY_TIMEOUT,
                        "upstream_timeout",
                        message.clone(),
                        details,
                    )
                } else {
                    (
                        StatusCode::BAD_GATEWAY,
                        "upstream_unavailable",
                        message.clone(),
                        details,
                    )
                }
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { balance, message } => {
                Self::InsufficientCredits { balance, message }
            }
            LedgerError::AccountNotFound { user_id } => {
                Self::NotFound(format!("Account not found: {user_id}"))
            }
            LedgerError::InvalidArgument(msg) => Self::BadRequest(msg),
            LedgerError::InvalidId(e) => Self::BadRequest(e.to_string()),
            err @ LedgerError::CorruptAccount { .. } => Self::Internal(err.to_string()),
            LedgerError::Storage(msg) => Self::Internal(msg),
        }
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::NoBackendSelected => Self::NoBackendSelected,
            ExecutionError::InvalidEndpoint(msg) => Self::InvalidBackend(msg),
            ExecutionError::Provider {
                status,
                code,
                message,
            } => Self::Provider {
                status,
                code,
                message,
            },
            ExecutionError::Transport { message, timed_out } => {
                Self::Upstream { message, timed_out }
            }
            ExecutionError::Decode(msg) => Self::Provider {
                status: 502,
                code: None,
                message: msg,
            },
            ExecutionError::Configuration(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::InsufficientCredits { balance } => Self::InsufficientCredits {
                balance,
                message: format!("Insufficient credits: balance {balance}"),
            },
            StoreError::PreconditionFailed(msg) => Self::BadRequest(msg),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(format!("Invalid user ID: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn ledger_errors_map_to_statuses() {
        assert_eq!(
            status_of(
                LedgerError::InsufficientCredits {
                    balance: 0,
                    message: "none".into()
                }
                .into()
            ),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(
                LedgerError::AccountNotFound {
                    user_id: "u".into()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::Storage("down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn execution_errors_map_to_statuses() {
        let provider = |status| ExecutionError::Provider {
            status,
            code: None,
            message: "x".into(),
        };
        assert_eq!(
            status_of(provider(404).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(provider(500).into()), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(
                ExecutionError::Transport {
                    message: "t".into(),
                    timed_out: true
                }
                .into()
            ),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(ExecutionError::NoBackendSelected.into()),
            StatusCode::CONFLICT
        );
    }
}
