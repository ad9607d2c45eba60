//! Validated query request types.
//!
//! A [`QueryRequest`] can only be built by [`crate::validate()`], so holding one
//! means every identifier in it has passed the whitelist and every mutating
//! variant carries its filters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum identifier length in bytes (PostgreSQL's `NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// The four supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Read rows.
    Select,
    /// Create a row.
    Insert,
    /// Change rows matching filters.
    Update,
    /// Remove rows matching filters.
    Delete,
}

impl Operation {
    /// Get the operation name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse the wire literal. Matching is exact.
    #[must_use]
    pub fn from_literal(s: &str) -> Option<Self> {
        match s {
            "select" => Some(Self::Select),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Whether the operation writes.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Select)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table or column name matching `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Check `value` against the identifier whitelist.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        is_identifier(value).then(|| Self(value.to_string()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An opaque filter or data value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number, kept in its original representation.
    Number(serde_json::Number),
    /// JSON string.
    String(String),
}

impl Scalar {
    /// Convert a JSON value. Arrays and objects are not scalars.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Identifier to scalar mapping used for filters and row data.
pub type Fields = BTreeMap<Identifier, Scalar>;

/// Sort specification for a select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    /// Column to sort on.
    pub column: Identifier,
    /// Ascending when true.
    pub ascending: bool,
}

/// A validated select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectQuery {
    /// Target table.
    pub table: Identifier,
    /// Column projection; empty means all columns.
    pub columns: Vec<Identifier>,
    /// Equality predicates, all of which must match.
    pub filters: Fields,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
    /// Row limit, at most [`crate::MAX_LIMIT`].
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
}

/// A validated insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertQuery {
    /// Target table.
    pub table: Identifier,
    /// Field values of the new row. Never empty.
    pub data: Fields,
    /// Columns to report back; empty means the provider default.
    pub returning: Vec<Identifier>,
}

/// A validated update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateQuery {
    /// Target table.
    pub table: Identifier,
    /// Equality predicates. Never empty.
    pub filters: Fields,
    /// Field changes. Never empty.
    pub data: Fields,
    /// Columns to report back; empty means the provider default.
    pub returning: Vec<Identifier>,
}

/// A validated delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteQuery {
    /// Target table.
    pub table: Identifier,
    /// Equality predicates. Never empty.
    pub filters: Fields,
    /// Columns to report back; empty means the provider default.
    pub returning: Vec<Identifier>,
}

/// A request that has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum QueryRequest {
    /// Read rows.
    Select(SelectQuery),
    /// Create a row.
    Insert(InsertQuery),
    /// Change rows matching filters.
    Update(UpdateQuery),
    /// Remove rows matching filters.
    Delete(DeleteQuery),
}

impl QueryRequest {
    /// The operation discriminant.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Select(_) => Operation::Select,
            Self::Insert(_) => Operation::Insert,
            Self::Update(_) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
        }
    }

    /// The target table.
    #[must_use]
    pub const fn table(&self) -> &Identifier {
        match self {
            Self::Select(q) => &q.table,
            Self::Insert(q) => &q.table,
            Self::Update(q) => &q.table,
            Self::Delete(q) => &q.table,
        }
    }
}
