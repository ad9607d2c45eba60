//! Error types for quill-proxy.

use crate::request::Operation;

/// A request rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `operation` is missing or not one of the four literals.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A table or column name failed the identifier whitelist.
    #[error("invalid identifier in {location}: {value:?}")]
    InvalidIdentifier {
        /// Where the identifier appeared (`table`, `filters`, ...).
        location: &'static str,
        /// The rejected text.
        value: String,
    },

    /// Update or delete without a non-empty `filters` object.
    #[error("{operation} requires a non-empty filters object")]
    MissingFilter {
        /// The offending operation.
        operation: Operation,
    },

    /// Insert or update without a non-empty `data` object.
    #[error("{operation} requires a non-empty data object")]
    MissingData {
        /// The offending operation.
        operation: Operation,
    },

    /// `limit` above the cap. Never clamped.
    #[error("limit {limit} exceeds the maximum of {max}")]
    LimitExceeded {
        /// Requested limit.
        limit: u64,
        /// Cap.
        max: u64,
    },

    /// A filter or data value is an array or object.
    #[error("{location}.{field} must be a string, number, boolean or null")]
    InvalidValueType {
        /// `filters` or `data`.
        location: &'static str,
        /// The field holding the value.
        field: String,
    },

    /// A field that is unknown or does not apply to the operation.
    #[error("unexpected field {field:?} for {operation}")]
    UnexpectedField {
        /// The field name.
        field: String,
        /// The request's operation.
        operation: Operation,
    },

    /// Wrong JSON shape (not an object, list of non-strings, bad limit...).
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::MissingFilter { .. } => "missing_filter",
            Self::MissingData { .. } => "missing_data",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::InvalidValueType { .. } => "invalid_value_type",
            Self::UnexpectedField { .. } => "unexpected_field",
            Self::Malformed(_) => "malformed_request",
        }
    }
}

/// A failure while executing a validated request.
///
/// No variant ever carries the privileged key: provider and transport
/// messages are redacted before they are stored here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The user has no backend project selected.
    #[error("no backend project selected")]
    NoBackendSelected,

    /// The selection's endpoint is not a usable URL.
    #[error("invalid backend endpoint: {0}")]
    InvalidEndpoint(String),

    /// The provider answered with a non-2xx status.
    #[error("provider returned {status}: {message}")]
    Provider {
        /// HTTP status.
        status: u16,
        /// Provider error code, when the body carried one.
        code: Option<String>,
        /// Provider message.
        message: String,
    },

    /// Connection-level failure (timeout, DNS, TLS, reset).
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
        /// Whether the request hit its deadline.
        timed_out: bool,
    },

    /// A 2xx body that is not JSON rows.
    #[error("could not decode provider response: {0}")]
    Decode(String),

    /// The HTTP client could not be built.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ExecutionError {
    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the provider rejected the request itself (4xx).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Provider { status, .. } if *status >= 400 && *status < 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        let transport = ExecutionError::Transport {
            message: "connection reset".into(),
            timed_out: false,
        };
        assert!(transport.is_retryable());

        let provider = ExecutionError::Provider {
            status: 404,
            code: Some("42P01".into()),
            message: "relation does not exist".into(),
        };
        assert!(!provider.is_retryable());
        assert!(provider.is_client_error());
        assert!(!ExecutionError::NoBackendSelected.is_retryable());
    }

    #[test]
    fn validation_codes_are_stable() {
        let err = ValidationError::MissingFilter {
            operation: Operation::Delete,
        };
        assert_eq!(err.code(), "missing_filter");
        assert_eq!(
            err.to_string(),
            "delete requires a non-empty filters object"
        );
    }
}
