//! External backend selection.
//!
//! A user may bind one externally hosted tabular-data project to their
//! workspace. The selection carries two credentials: a public key that is safe
//! to hand to client code, and a privileged key that bypasses the provider's
//! row-level policies. The privileged key never leaves the server:
//! [`BackendSelection`] does not implement `Serialize`, and [`PrivilegedKey`]
//! formats as `[redacted]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A credential that bypasses the provider's row-level access policy.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivilegedKey(String);

impl PrivilegedKey {
    /// Wrap a raw key.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Return the raw key for use in an outbound request header.
    ///
    /// This is the only way to read the key; callers must not log or return
    /// the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PrivilegedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivilegedKey([redacted])")
    }
}

impl fmt::Display for PrivilegedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl<'de> Deserialize<'de> for PrivilegedKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self)
    }
}

/// The user's selected external project and its credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendSelection {
    /// Provider identifier of the selected project.
    pub project_ref: String,

    /// Base URL of the provider's REST API for the project.
    pub public_endpoint: String,

    /// Credential safe for client-side exposure.
    pub public_key: String,

    /// Credential that bypasses row-level restrictions. Server-side only.
    pub privileged_key: PrivilegedKey,
}

impl BackendSelection {
    /// Create a selection after checking its fields.
    ///
    /// # Errors
    ///
    /// Returns a [`SelectionError`] if a field is empty or the endpoint is not
    /// an `http(s)` URL.
    pub fn new(
        project_ref: impl Into<String>,
        public_endpoint: impl Into<String>,
        public_key: impl Into<String>,
        privileged_key: PrivilegedKey,
    ) -> Result<Self, SelectionError> {
        let selection = Self {
            project_ref: project_ref.into(),
            public_endpoint: public_endpoint.into().trim_end_matches('/').to_string(),
            public_key: public_key.into(),
            privileged_key,
        };
        selection.validate()?;
        Ok(selection)
    }

    /// Check the selection's fields.
    ///
    /// # Errors
    ///
    /// Returns a [`SelectionError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), SelectionError> {
        if self.project_ref.trim().is_empty() {
            return Err(SelectionError::MissingField("project_ref"));
        }
        if self.public_key.is_empty() {
            return Err(SelectionError::MissingField("public_key"));
        }
        if self.privileged_key.is_empty() {
            return Err(SelectionError::MissingField("privileged_key"));
        }
        let endpoint = self.public_endpoint.as_str();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(SelectionError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(())
    }

    /// The part of the selection that may be returned to callers.
    #[must_use]
    pub fn public_view(&self) -> PublicBackendSelection {
        PublicBackendSelection {
            project_ref: self.project_ref.clone(),
            public_endpoint: self.public_endpoint.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

/// Serializable view of a [`BackendSelection`] without the privileged key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicBackendSelection {
    /// Provider identifier of the selected project.
    pub project_ref: String,
    /// Base URL of the provider's REST API.
    pub public_endpoint: String,
    /// Client-safe credential.
    pub public_key: String,
}

/// Errors raised when building a backend selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// A required field was empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The endpoint is not an `http(s)` URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> BackendSelection {
        BackendSelection::new(
            "abcdefghijklmnop",
            "https://abcdefghijklmnop.example.co/",
            "anon-key",
            PrivilegedKey::new("service-role-secret"),
        )
        .unwrap()
    }

    #[test]
    fn privileged_key_is_redacted_in_formatting() {
        let sel = selection();
        let debug = format!("{sel:?}");
        assert!(!debug.contains("service-role-secret"));
        assert!(debug.contains("[redacted]"));
        assert_eq!(sel.privileged_key.to_string(), "[redacted]");
    }

    #[test]
    fn public_view_omits_privileged_key() {
        let json = serde_json::to_string(&selection().public_view()).unwrap();
        assert!(!json.contains("service-role-secret"));
        assert!(json.contains("anon-key"));
    }

    #[test]
    fn endpoint_is_normalized_and_checked() {
        assert_eq!(
            selection().public_endpoint,
            "https://abcdefghijklmnop.example.co"
        );

        let err = BackendSelection::new(
            "ref",
            "ftp://example.com",
            "anon",
            PrivilegedKey::new("secret"),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::InvalidEndpoint(_)));
    }

    #[test]
    fn empty_privileged_key_is_rejected() {
        let err = BackendSelection::new("ref", "https://x.example", "anon", PrivilegedKey::new(""))
            .unwrap_err();
        assert_eq!(err, SelectionError::MissingField("privileged_key"));
    }
}
