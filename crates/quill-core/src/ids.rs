//! Identifier types for quill.
//!
//! Account identities are owned by the external auth provider; quill only
//! stores a reference to them. The reference is kept opaque but is checked
//! for shape so that it is always safe to log and to use as a storage key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a user identifier in bytes.
pub const MAX_USER_ID_LEN: usize = 128;

/// A user identifier issued by the external auth provider.
///
/// The value is opaque (`user_2ab…`, a UUID, an email-like subject) but must be
/// non-empty, at most [`MAX_USER_ID_LEN`] bytes, and free of whitespace and
/// control characters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a user identifier, checking its shape.
    ///
    /// # Errors
    ///
    /// Returns an [`IdError`] if the value is empty, too long, or contains
    /// whitespace or control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        if value.len() > MAX_USER_ID_LEN {
            return Err(IdError::TooLong {
                len: value.len(),
                max: MAX_USER_ID_LEN,
            });
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdError::InvalidCharacter);
        }
        Ok(Self(value))
    }

    /// Generate a new random identifier (primarily for testing).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier was empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeded the maximum length.
    #[error("identifier is {len} bytes, maximum is {max}")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
        /// Maximum allowed length in bytes.
        max: usize,
    },

    /// The identifier contained whitespace or control characters.
    #[error("identifier contains whitespace or control characters")]
    InvalidCharacter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_provider_style_ids() {
        assert!(UserId::new("user_2abcDEF123").is_ok());
        assert!(UserId::new("9f1c1a4e-8a51-4f4e-9a2b-0d4a1b2c3d4e").is_ok());
        assert!(UserId::new("auth0|5f7c8ec7c33c6c004bbafe82").is_ok());
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(UserId::new(""), Err(IdError::Empty));
        assert_eq!(UserId::new("user 1"), Err(IdError::InvalidCharacter));
        assert_eq!(UserId::new("user\n1"), Err(IdError::InvalidCharacter));
        assert!(matches!(
            UserId::new("x".repeat(MAX_USER_ID_LEN + 1)),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = UserId::new("user_42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user_42\"");

        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(UserId::generate(), UserId::generate());
    }
}
