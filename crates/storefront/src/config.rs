//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUICKCART_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`); not needed with `QUICKCART_STORE=memory`
//! - `IDENTITY_WEBHOOK_SECRET` - `whsec_` secret for identity webhooks
//! - `IDENTITY_JWT_PUBLIC_KEY` (RS256 PEM) or `IDENTITY_JWT_SECRET` (HS256,
//!   high entropy) - not needed with `IDENTITY_MODE=header`
//!
//! ## Optional
//! - `QUICKCART_HOST` - Bind address (default: 127.0.0.1)
//! - `QUICKCART_PORT` - Listen port (default: 3000)
//! - `QUICKCART_STORE` - `postgres` (default) or `memory`
//! - `IDENTITY_MODE` - `jwt` (default) or `header`
//! - `IDENTITY_USER_HEADER` - Header read in header mode (default: x-user-id)
//! - `IDENTITY_JWT_ISSUER` - Required `iss` claim
//! - `IDENTITY_API_URL` + `IDENTITY_API_SECRET` - Identity provider backend
//!   API, used for the seller role lookup
//! - `SELLER_USER_IDS` - Comma-separated user ids that are always sellers
//! - `USER_SYNC_POLICY` - `lenient` (default) or `strict`
//! - `EVENT_MAX_ATTEMPTS` - Deliveries per event handler (default: 5)
//! - `EVENT_RETRY_BASE_MS` - First retry delay in ms, doubled per retry
//!   (default: 250)
//! - `LOG_FORMAT` - `json` for JSON logs, text otherwise
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::events::RetryPolicy;
use crate::identity::header::DEFAULT_USER_HEADER;
use crate::services::SyncPolicy;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Backing store
    pub store: StoreConfig,
    /// Identity provider integration
    pub identity: IdentityConfig,
    /// Event bus and sync settings
    pub events: EventConfig,
    /// Emit JSON logs
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. production, staging)
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Which store backs the repositories.
#[derive(Clone)]
pub enum StoreConfig {
    /// `PostgreSQL` (contains password)
    Postgres { database_url: SecretString },
    /// In-process store; data is lost on restart.
    Memory,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// How callers are identified.
#[derive(Clone)]
pub enum IdentityMode {
    /// RS256 session tokens verified with a PEM public key.
    JwtPublicKey(SecretString),
    /// HS256 session tokens verified with a shared secret.
    JwtSecret(SecretString),
    /// Trusted header set by an authenticating proxy.
    Header(String),
}

impl std::fmt::Debug for IdentityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JwtPublicKey(_) => f.write_str("JwtPublicKey([REDACTED])"),
            Self::JwtSecret(_) => f.write_str("JwtSecret([REDACTED])"),
            Self::Header(name) => f.debug_tuple("Header").field(name).finish(),
        }
    }
}

/// Identity provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Caller identification
    pub mode: IdentityMode,
    /// Required `iss` claim on session tokens
    pub issuer: Option<String>,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
    /// Backend API base URL for seller lookups
    pub api_url: Option<Url>,
    /// Backend API secret key
    pub api_secret: Option<SecretString>,
    /// Users that are sellers regardless of their provider role
    pub seller_ids: Vec<String>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("mode", &self.mode)
            .field("issuer", &self.issuer)
            .field("webhook_secret", &"[REDACTED]")
            .field("api_url", &self.api_url.as_ref().map(Url::as_str))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("seller_ids", &self.seller_ids)
            .finish()
    }
}

/// Event delivery configuration.
#[derive(Debug, Clone, Copy)]
pub struct EventConfig {
    /// Deliveries per handler, first attempt included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub retry_base: Duration,
    /// Validation applied to identity user events
    pub sync_policy: SyncPolicy,
}

impl EventConfig {
    /// Retry policy for the bus.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.retry_base,
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_attempts: retry.max_attempts,
            retry_base: retry.base_delay,
            sync_policy: SyncPolicy::default(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("QUICKCART_HOST", "127.0.0.1")?;
        let port = parse_env("QUICKCART_PORT", "3000")?;
        let store = StoreConfig::from_env()?;
        let identity = IdentityConfig::from_env()?;
        let events = EventConfig::from_env()?;

        let json_logs = get_optional_env("LOG_FORMAT")
            .is_some_and(|format| format.eq_ignore_ascii_case("json"));

        Ok(Self {
            host,
            port,
            store,
            identity,
            events,
            json_logs,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        match get_env_or_default("QUICKCART_STORE", "postgres").as_str() {
            "postgres" => Ok(Self::Postgres {
                database_url: get_database_url("QUICKCART_DATABASE_URL")?,
            }),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidEnvVar(
                "QUICKCART_STORE".to_string(),
                format!("expected 'postgres' or 'memory', got '{other}'"),
            )),
        }
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mode = match get_env_or_default("IDENTITY_MODE", "jwt").as_str() {
            "jwt" => {
                if let Some(pem) = get_optional_env("IDENTITY_JWT_PUBLIC_KEY") {
                    IdentityMode::JwtPublicKey(SecretString::from(pem))
                } else if get_optional_env("IDENTITY_JWT_SECRET").is_some() {
                    IdentityMode::JwtSecret(get_validated_secret("IDENTITY_JWT_SECRET")?)
                } else {
                    return Err(ConfigError::MissingEnvVar(
                        "IDENTITY_JWT_PUBLIC_KEY or IDENTITY_JWT_SECRET".to_string(),
                    ));
                }
            }
            "header" => IdentityMode::Header(get_env_or_default(
                "IDENTITY_USER_HEADER",
                DEFAULT_USER_HEADER,
            )),
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "IDENTITY_MODE".to_string(),
                    format!("expected 'jwt' or 'header', got '{other}'"),
                ));
            }
        };

        let api_url = get_optional_env("IDENTITY_API_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("IDENTITY_API_URL".to_string(), e.to_string())
                })
            })
            .transpose()?;
        let api_secret = match api_url {
            Some(_) => Some(get_required_secret("IDENTITY_API_SECRET")?),
            None => None,
        };

        Ok(Self {
            mode,
            issuer: get_optional_env("IDENTITY_JWT_ISSUER"),
            webhook_secret: get_required_secret("IDENTITY_WEBHOOK_SECRET")?,
            api_url,
            api_secret,
            seller_ids: split_list(&get_env_or_default("SELLER_USER_IDS", "")),
        })
    }
}

impl EventConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_attempts: u32 = parse_env("EVENT_MAX_ATTEMPTS", "5")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "EVENT_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let retry_base_ms: u64 = parse_env("EVENT_RETRY_BASE_MS", "250")?;
        let sync_policy = parse_env("USER_SYNC_POLICY", "lenient")?;

        Ok(Self {
            max_attempts,
            retry_base: Duration::from_millis(retry_base_ms),
            sync_policy,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-jwt-secret-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err =
            validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" user_1, ,user_2 ,"), ["user_1", "user_2"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_event_config_retry_policy() {
        let config = EventConfig {
            max_attempts: 3,
            retry_base: Duration::from_millis(10),
            sync_policy: SyncPolicy::Strict,
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            store: StoreConfig::Memory,
            identity: IdentityConfig {
                mode: IdentityMode::Header(DEFAULT_USER_HEADER.to_string()),
                issuer: None,
                webhook_secret: SecretString::from("whsec_dGVzdA=="),
                api_url: None,
                api_secret: None,
                seller_ids: Vec::new(),
            },
            events: EventConfig::default(),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let identity = IdentityConfig {
            mode: IdentityMode::JwtSecret(SecretString::from("super_secret_jwt_value")),
            issuer: Some("https://id.example.com".to_string()),
            webhook_secret: SecretString::from("whsec_super_secret_webhook"),
            api_url: Some(Url::parse("https://api.id.example.com").unwrap()),
            api_secret: Some(SecretString::from("sk_super_secret_api")),
            seller_ids: vec!["user_1".to_string()],
        };
        let store = StoreConfig::Postgres {
            database_url: SecretString::from("postgres://app:hunter2@db/quickcart"),
        };

        let debug_output = format!("{identity:?} {store:?}");

        assert!(debug_output.contains("https://id.example.com"));
        assert!(debug_output.contains("user_1"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret"));
        assert!(!debug_output.contains("hunter2"));
    }
}
