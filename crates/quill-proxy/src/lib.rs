//! Validated query proxy for quill.
//!
//! Generated client code describes a CRUD operation as a small JSON object.
//! This crate checks it against a closed vocabulary ([`validate()`]), turns it
//! into one PostgREST call ([`translate::prepare`]) and runs it with the
//! user's server-held privileged key ([`QueryExecutor`]).
//!
//! # Example
//!
//! ```no_run
//! use quill_core::{BackendSelection, PrivilegedKey};
//! use quill_proxy::{validate, QueryExecutor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let selection = BackendSelection::new(
//!     "abcd1234",
//!     "https://abcd1234.example.co",
//!     "public-anon-key",
//!     PrivilegedKey::new("service-role-key"),
//! )?;
//!
//! let request = validate(&serde_json::json!({
//!     "operation": "select",
//!     "table": "todos",
//!     "filters": {"done": false},
//!     "limit": 20
//! }))?;
//!
//! let executor = QueryExecutor::new()?;
//! let result = executor.execute(Some(&selection), &request).await?;
//! println!("{} rows", result.count);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod executor;
pub mod redact;
pub mod request;
pub mod translate;
pub mod validate;

pub use error::{ExecutionError, ValidationError};
pub use executor::{ExecutorOptions, QueryExecutor, QueryResult, DEFAULT_TIMEOUT};
pub use redact::key_fingerprint;
pub use request::{
    DeleteQuery, Fields, Identifier, InsertQuery, Operation, OrderBy, QueryRequest, Scalar,
    SelectQuery, UpdateQuery, MAX_IDENTIFIER_LEN,
};
pub use validate::{validate, MAX_LIMIT};
