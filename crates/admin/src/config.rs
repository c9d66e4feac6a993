//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - Public URL for the admin API
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `ADMIN_JWT_SECRET` - HS256 signing key for `auth_token` (min 32 chars, high entropy)
//! - `ADMIN_EMAILS` - Comma-separated allow-list of admin emails
//! - `OAUTH_AUTHORIZE_URL`, `OAUTH_TOKEN_URL`, `OAUTH_USERINFO_URL` - Provider endpoints
//! - `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET` - OAuth client credentials
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `OAUTH_SCOPES` - Requested scopes (default: `openid email profile`)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use larder_core::Email;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Admin application configuration.
#[derive(Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the admin API
    pub base_url: String,
    /// Session signing secret (OAuth state only)
    pub session_secret: SecretString,
    /// `auth_token` signing key
    pub jwt_secret: SecretString,
    /// Emails allowed to log in, normalized
    pub admin_emails: Vec<Email>,
    /// Staff login provider
    pub oauth: OAuthConfig,
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("session_secret", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("admin_emails", &self.admin_emails.len())
            .field("oauth", &self.oauth)
            .field("log_format", &self.log_format)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

/// OAuth 2.0 / `OpenID` Connect provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct OAuthConfig {
    pub authorize_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scopes: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("userinfo_url", &self.userinfo_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl AdminConfig {
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

        let session_secret = get_validated_secret("ADMIN_SESSION_SECRET")?;
        validate_secret_length(&session_secret, "ADMIN_SESSION_SECRET")?;
        let jwt_secret = get_validated_secret("ADMIN_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "ADMIN_JWT_SECRET")?;

        Ok(Self {
            database_url: get_database_url("ADMIN_DATABASE_URL")?,
            host: parse_env("ADMIN_HOST", "127.0.0.1")?,
            port: parse_env("ADMIN_PORT", "3001")?,
            base_url: get_required_env("ADMIN_BASE_URL")?,
            session_secret,
            jwt_secret,
            admin_emails: parse_admin_emails(&get_required_env("ADMIN_EMAILS")?)?,
            oauth: OAuthConfig::from_env()?,
            log_format: LogFormat::parse(get_optional_env("LOG_FORMAT").as_deref()),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The OAuth redirect URI registered with the provider.
    #[must_use]
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.base_url.trim_end_matches('/'))
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Whether `email` is on the admin allow-list.
    #[must_use]
    pub fn is_admin(&self, email: &Email) -> bool {
        self.admin_emails.contains(email)
    }
}

impl OAuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            authorize_url: get_url("OAUTH_AUTHORIZE_URL")?,
            token_url: get_url("OAUTH_TOKEN_URL")?,
            userinfo_url: get_url("OAUTH_USERINFO_URL")?,
            client_id: get_required_env("OAUTH_CLIENT_ID")?,
            client_secret: get_validated_secret("OAUTH_CLIENT_SECRET")?,
            scopes: get_env_or_default("OAUTH_SCOPES", "openid email profile"),
        })
    }
}

/// Parse the comma-separated allow-list. Blank entries are skipped; an empty
/// list is an error since nobody could log in.
fn parse_admin_emails(raw: &str) -> Result<Vec<Email>, ConfigError> {
    let emails = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Email::parse(s).map_err(|e| {
                ConfigError::InvalidEnvVar("ADMIN_EMAILS".to_string(), format!("{s}: {e}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if emails.is_empty() {
        return Err(ConfigError::InvalidEnvVar(
            "ADMIN_EMAILS".to_string(),
            "must list at least one email".to_string(),
        ));
    }
    Ok(emails)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a required absolute URL.
fn get_url(key: &str) -> Result<Url, ConfigError> {
    let value = get_required_env(key)?;
    Url::parse(&value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)]
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
pub(crate) mod tests {
    use super::*;

    /// A fully populated config for handler and service tests.
    pub(crate) fn test_config() -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/larder_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            session_secret: SecretString::from("s".repeat(32)),
            jwt_secret: SecretString::from("Jq8#vN2!pR5@tW9$yB3%kM6^dF1&hL4*"),
            admin_emails: vec![Email::parse("owner@larder.test").unwrap()],
            oauth: OAuthConfig {
                authorize_url: Url::parse("https://id.test/authorize").unwrap(),
                token_url: Url::parse("https://id.test/token").unwrap(),
                userinfo_url: Url::parse("https://id.test/userinfo").unwrap(),
                client_id: "larder-admin".to_string(),
                client_secret: SecretString::from("client_secret_value"),
                scopes: "openid email profile".to_string(),
            },
            log_format: LogFormat::Text,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_parse_admin_emails_normalizes() {
        let emails = parse_admin_emails(" Owner@Larder.test, ,ops@larder.test ").unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].as_str(), "owner@larder.test");
    }

    #[test]
    fn test_parse_admin_emails_rejects_empty_and_invalid() {
        assert!(matches!(
            parse_admin_emails(" , "),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            parse_admin_emails("owner@larder.test,not-an-email"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_is_admin() {
        let config = test_config();
        assert!(config.is_admin(&Email::parse("OWNER@larder.test").unwrap()));
        assert!(!config.is_admin(&Email::parse("someone@larder.test").unwrap()));
    }

    #[test]
    fn test_redirect_uri_and_cookies() {
        let mut config = test_config();
        config.base_url = "https://admin.larder.test/".to_string();
        assert_eq!(
            config.oauth_redirect_uri(),
            "https://admin.larder.test/auth/callback"
        );
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_secret_validation() {
        assert!(validate_secret_strength("your-jwt-key-here", "ADMIN_JWT_SECRET").is_err());
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "X").is_err());
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "X").is_ok());
        assert!(
            validate_secret_length(&SecretString::from("short"), "ADMIN_JWT_SECRET").is_err()
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("Jq8#"));
        assert!(!debug.contains("client_secret_value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
