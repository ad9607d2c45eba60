//! Quill HTTP API Service.
//!
//! This crate exposes the credit ledger and the query proxy over HTTP:
//!
//! - Account initialization and status
//! - Credit check and consume (the gate every metered action passes)
//! - Admin subscription lifecycle (upgrade, downgrade, renew, bonus, expiry)
//! - Backend selection and validated query proxying
//!
//! # Authentication
//!
//! Two API keys, both compared in constant time:
//!
//! 1. **Service key** (`x-api-key`) - for the orchestration layer on `/v1/accounts`
//! 2. **Admin key** (`x-admin-key`) - for billing workflows on `/v1/admin`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
