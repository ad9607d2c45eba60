//! Query execution against the selected backend.
//!
//! One validated request becomes one HTTP round trip. The privileged key is
//! attached as both `apikey` and `Authorization: Bearer`; it is read only
//! here, and everything that leaves this module (errors, logs) goes through
//! [`crate::redact`].

use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quill_core::{BackendSelection, PrivilegedKey};

use crate::error::ExecutionError;
use crate::redact::{key_fingerprint, redact};
use crate::request::{Operation, QueryRequest};
use crate::translate::{prepare, PreparedCall};

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider messages longer than this are cut.
const MAX_MESSAGE_LEN: usize = 512;

/// Executor options.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Deadline for each call unless overridden.
    pub timeout: Duration,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("quill-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Rows returned by an executed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The operation that ran.
    pub operation: Operation,
    /// Returned rows; empty when nothing matched.
    pub rows: Vec<Value>,
    /// Number of rows in `rows`.
    pub count: usize,
}

impl QueryResult {
    fn new(operation: Operation, rows: Vec<Value>) -> Self {
        let count = rows.len();
        Self {
            operation,
            rows,
            count,
        }
    }
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// Issues validated requests against a user's backend.
///
/// Holds no credentials; each call takes the selection explicitly.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    client: Client,
    options: ExecutorOptions,
}

impl QueryExecutor {
    /// Create an executor with default options.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ExecutionError> {
        Self::with_options(ExecutorOptions::default())
    }

    /// Create an executor with custom options.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn with_options(options: ExecutorOptions) -> Result<Self, ExecutionError> {
        // Redirects are not followed: reqwest would replay the `apikey`
        // header to whatever host the provider points at.
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ExecutionError::Configuration(e.to_string()))?;
        Ok(Self { client, options })
    }

    /// Execute with the default deadline.
    ///
    /// # Errors
    ///
    /// Returns `NoBackendSelected` when `selection` is `None`, `Provider` for
    /// a non-2xx answer (redirects included), `Transport` for connection
    /// failures and timeouts.
    pub async fn execute(
        &self,
        selection: Option<&BackendSelection>,
        request: &QueryRequest,
    ) -> Result<QueryResult, ExecutionError> {
        self.execute_with_timeout(selection, request, self.options.timeout)
            .await
    }

    /// Execute with a caller-supplied deadline.
    ///
    /// # Errors
    ///
    /// Same as [`Self::execute`]; an expired deadline is a `Transport` error
    /// with `timed_out` set.
    pub async fn execute_with_timeout(
        &self,
        selection: Option<&BackendSelection>,
        request: &QueryRequest,
        timeout: Duration,
    ) -> Result<QueryResult, ExecutionError> {
        let selection = selection.ok_or(ExecutionError::NoBackendSelected)?;
        let key = &selection.privileged_key;
        let call = prepare(request);
        let url = endpoint_url(&selection.public_endpoint, &call.path)?;
        let operation = request.operation();

        tracing::debug!(
            project_ref = %selection.project_ref,
            key = %key_fingerprint(key),
            operation = %operation,
            table = %request.table(),
            "Proxying query"
        );

        let response = self
            .send(url, &call, key, timeout)
            .await
            .map_err(|e| transport_error(&e, key))?;

        let status = response.status();
        if !status.is_success() {
            let err = provider_error(response, key).await;
            tracing::warn!(
                project_ref = %selection.project_ref,
                operation = %operation,
                status = status.as_u16(),
                error = %err,
                "Provider rejected query"
            );
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&e, key))?;
        let rows = decode_rows(&body).map_err(|msg| ExecutionError::Decode(redact(&msg, key)))?;

        tracing::debug!(
            project_ref = %selection.project_ref,
            operation = %operation,
            rows = rows.len(),
            "Query executed"
        );
        Ok(QueryResult::new(operation, rows))
    }

    async fn send(
        &self,
        url: Url,
        call: &PreparedCall,
        key: &PrivilegedKey,
        timeout: Duration,
    ) -> reqwest::Result<Response> {
        let mut builder = self
            .client
            .request(call.method.clone(), url)
            .timeout(timeout)
            .query(&call.query)
            .header("apikey", key.expose())
            .bearer_auth(key.expose())
            .header("accept", "application/json");

        if let Some(prefer) = call.prefer {
            builder = builder.header("prefer", prefer);
        }
        if let Some(body) = &call.body {
            builder = builder.json(body);
        }

        builder.send().await
    }
}

fn endpoint_url(endpoint: &str, path: &str) -> Result<Url, ExecutionError> {
    let base = endpoint.trim_end_matches('/');
    let url = Url::parse(&format!("{base}{path}"))
        .map_err(|e| ExecutionError::InvalidEndpoint(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExecutionError::InvalidEndpoint(format!(
            "unsupported scheme {other:?}"
        ))),
    }
}

fn transport_error(err: &reqwest::Error, key: &PrivilegedKey) -> ExecutionError {
    ExecutionError::Transport {
        message: redact(&err.to_string(), key),
        timed_out: err.is_timeout(),
    }
}

async fn provider_error(response: Response, key: &PrivilegedKey) -> ExecutionError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let (code, message) = match serde_json::from_str::<ProviderErrorBody>(&text) {
        Ok(body) => {
            let message = [body.message, body.details, body.hint]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (body.code, message)
        }
        Err(_) => (None, text),
    };

    let message = if message.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("provider error")
            .to_string()
    } else {
        truncate(&message)
    };

    ExecutionError::Provider {
        status: status.as_u16(),
        code,
        message: redact(&message, key),
    }
}

/// Rows from a 2xx body: an array, a single object, or nothing.
fn decode_rows(body: &str) -> Result<Vec<Value>, String> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(body).map_err(|e| e.to_string())? {
        Value::Array(rows) => Ok(rows),
        row @ Value::Object(_) => Ok(vec![row]),
        other => Err(format!("expected rows, got {other}")),
    }
}

fn truncate(message: &str) -> String {
    if message.len() <= MAX_MESSAGE_LEN {
        return message.to_string();
    }
    let mut end = MAX_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}
