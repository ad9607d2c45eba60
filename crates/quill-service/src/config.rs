//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use quill_core::CreditPolicy;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection URL. Without one the service runs on the
    /// in-memory store.
    pub database_url: Option<String>,

    /// API key for the orchestration layer (`x-api-key`).
    pub service_api_key: Option<String>,

    /// API key for billing/admin workflows (`x-admin-key`).
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Deadline for one proxied backend call, in seconds.
    pub proxy_timeout_seconds: u64,

    /// Tier allowances and unit cost.
    pub policy: CreditPolicy,
}

/// Database secrets file structure.
#[derive(Debug, Deserialize)]
struct DatabaseSecrets {
    url: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .or_else(load_database_secrets),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            proxy_timeout_seconds: env_parse("PROXY_TIMEOUT_SECONDS")
                .unwrap_or(defaults.proxy_timeout_seconds),
            policy: policy_from_env(),
        }
    }
}

/// Read and parse an environment variable, ignoring unparsable values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Credit policy with per-field environment overrides.
fn policy_from_env() -> CreditPolicy {
    let defaults = CreditPolicy::default();
    let policy = CreditPolicy {
        units_per_credit: env_parse("UNITS_PER_CREDIT").unwrap_or(defaults.units_per_credit),
        free_tier_credits: env_parse("FREE_TIER_CREDITS").unwrap_or(defaults.free_tier_credits),
        pro_tier_credits: env_parse("PRO_TIER_CREDITS").unwrap_or(defaults.pro_tier_credits),
        enterprise_tier_credits: env_parse("ENTERPRISE_TIER_CREDITS")
            .unwrap_or(defaults.enterprise_tier_credits),
        ..defaults.clone()
    };

    match policy.validate() {
        Ok(()) => policy,
        Err(reason) => {
            tracing::warn!(reason = %reason, "Invalid credit policy overrides, using defaults");
            defaults
        }
    }
}

/// Load the database URL from a secrets file.
fn load_database_secrets() -> Option<String> {
    let secret_paths = [
        ".secrets/database.json",
        "quill/.secrets/database.json",
        "../.secrets/database.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<DatabaseSecrets>(Path::new(path)) {
            tracing::info!(path = %path, "Loaded database secrets from file");
            return Some(secrets.url);
        }
    }

    tracing::debug!("Database secrets file not found");
    None
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, std::io::Error> {
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            service_api_key: None,
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            proxy_timeout_seconds: 15,
            policy: CreditPolicy::default(),
        }
    }
}
