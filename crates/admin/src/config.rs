//! Back-office configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `AGENCIA_BASE_URL` - Public URL for the back-office (https enables secure cookies)
//! - `AGENCIA_ADMIN_EMAIL` - Email of the bootstrap admin
//! - `AGENCIA_ADMIN_PASSWORD` - Bootstrap admin password (validated secret), or
//!   `AGENCIA_ADMIN_PASSWORD_HASH` - an argon2 hash produced by `ac-cli hash-password`
//!
//! ## Optional
//! - `AGENCIA_HOST` - Bind address (default: 127.0.0.1)
//! - `AGENCIA_PORT` - Listen port (default: 3002)
//! - `AGENCIA_DATA_DIR` - Directory for persisted JSON state (default: in memory)
//! - `AGENCIA_SEED_DEMO_USERS` - Seed manager/sales/viewer demo users (default: false)
//! - `AGENCIA_TIMEZONE_OFFSET` - UTC offset for quiet hours and schedules (default: -03:00)
//! - `ANALYTICS_CACHE_TTL_SECS` - Analytics cache window (default: 300)
//! - `BACKUP_RETENTION_DAYS` - Backup retention window (default: 30)
//! - `BACKUP_STEP_DELAY_MS` - Delay between backup progress steps (default: 500)
//! - `NOTIFICATION_FEED_ENABLED` - Run the simulated real-time feed (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//!
//! ## Optional (PIX provider - all three together)
//! - `PIX_CLIENT_ID`, `PIX_CLIENT_SECRET`, `PIX_KEY`
//!
//! ## Optional (email provider - both together)
//! - `EMAIL_PROVIDER_API_KEY`, `EMAIL_FROM`
//!
//! ## Optional (TLS)
//! - `AGENCIA_TLS_CERT` - PEM-encoded certificate chain
//! - `AGENCIA_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use secrecy::SecretString;
use thiserror::Error;

use agencia_check_core::Email;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TIMEZONE_OFFSET: &str = "-03:00";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "senha",
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

/// Back-office application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Directory for persisted state; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    /// Bootstrap admin account
    pub bootstrap_admin: BootstrapAdmin,
    /// Whether to seed the demo users
    pub seed_demo_users: bool,
    /// Service tunables
    pub services: ServiceSettings,
    /// PIX payment provider credentials (optional)
    pub pix: Option<PixConfig>,
    /// Email notification provider (optional)
    pub email: Option<EmailProviderConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// The admin account created at startup.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    /// Login email
    pub email: Email,
    /// Password or pre-computed hash
    pub credential: AdminCredential,
}

/// How the bootstrap admin password is supplied.
#[derive(Clone)]
pub enum AdminCredential {
    /// Plain password, hashed at startup.
    Password(SecretString),
    /// Argon2 PHC string.
    Hash(String),
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password([REDACTED])"),
            Self::Hash(_) => f.write_str("Hash([REDACTED])"),
        }
    }
}

/// Tunables for the in-process services.
///
/// Grouped separately from [`AppConfig`] so services can be built in tests
/// without touching the environment.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Offset applied to wall-clock checks (quiet hours, backup schedules)
    pub timezone: FixedOffset,
    /// How long an analytics bundle stays cached
    pub analytics_cache_ttl: Duration,
    /// Max number of cached analytics bundles
    pub analytics_cache_capacity: u64,
    /// Backups older than this are removed by cleanup
    pub backup_retention_days: i64,
    /// Delay between backup progress steps
    pub backup_step_delay: Duration,
    /// How often the backup scheduler checks configs
    pub backup_scheduler_interval: Duration,
    /// Max notifications retained
    pub notification_capacity: usize,
    /// Max notifications held during quiet hours
    pub notification_queue_capacity: usize,
    /// Whether the simulated real-time feed runs
    pub feed_enabled: bool,
    /// Feed polling period
    pub feed_tick: Duration,
    /// Probability that a feed tick produces an event
    pub feed_event_probability: f64,
    /// First reconnect delay; doubles per attempt
    pub feed_reconnect_base: Duration,
    /// Reconnect attempts before the feed gives up
    pub feed_max_reconnect_attempts: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            timezone: FixedOffset::west_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
            analytics_cache_ttl: Duration::from_secs(300),
            analytics_cache_capacity: 100,
            backup_retention_days: 30,
            backup_step_delay: Duration::from_millis(500),
            backup_scheduler_interval: Duration::from_secs(60),
            notification_capacity: 1000,
            notification_queue_capacity: 100,
            feed_enabled: true,
            feed_tick: Duration::from_secs(30),
            feed_event_probability: 0.1,
            feed_reconnect_base: Duration::from_secs(1),
            feed_max_reconnect_attempts: 5,
        }
    }
}

/// PIX payment provider configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct PixConfig {
    /// Provider OAuth client ID
    pub client_id: String,
    /// Provider OAuth client secret
    pub client_secret: SecretString,
    /// PIX key that receives payments
    pub pix_key: String,
}

impl std::fmt::Debug for PixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("pix_key", &self.pix_key)
            .finish()
    }
}

impl PixConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let client_id = get_optional_env("PIX_CLIENT_ID");
        let client_secret = get_optional_env("PIX_CLIENT_SECRET");
        let pix_key = get_optional_env("PIX_KEY");

        match (client_id, client_secret, pix_key) {
            (Some(client_id), Some(secret), Some(pix_key)) => {
                validate_secret_strength(&secret, "PIX_CLIENT_SECRET")?;
                Ok(Some(Self {
                    client_id,
                    client_secret: SecretString::from(secret),
                    pix_key,
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PIX_*".to_string(),
                "PIX_CLIENT_ID, PIX_CLIENT_SECRET and PIX_KEY must be set together".to_string(),
            )),
        }
    }
}

/// Email notification provider configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct EmailProviderConfig {
    /// Provider API key
    pub api_key: SecretString,
    /// Sender address
    pub from_address: Email,
}

impl std::fmt::Debug for EmailProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailProviderConfig")
            .field("api_key", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl EmailProviderConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let api_key = get_optional_env("EMAIL_PROVIDER_API_KEY");
        let from = get_optional_env("EMAIL_FROM");

        match (api_key, from) {
            (Some(key), Some(from)) => {
                validate_secret_strength(&key, "EMAIL_PROVIDER_API_KEY")?;
                let from_address = Email::parse(&from)
                    .map_err(|e| ConfigError::InvalidEnvVar("EMAIL_FROM".to_string(), e.to_string()))?;
                Ok(Some(Self {
                    api_key: SecretString::from(key),
                    from_address,
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "EMAIL_*".to_string(),
                "Both EMAIL_PROVIDER_API_KEY and EMAIL_FROM must be set together".to_string(),
            )),
        }
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("AGENCIA_TLS_CERT");
        let key_pem = get_optional_env("AGENCIA_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "AGENCIA_TLS_*".to_string(),
                "Both AGENCIA_TLS_CERT and AGENCIA_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AppConfig {
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

        let host = get_env_or_default("AGENCIA_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("AGENCIA_HOST".to_string(), e.to_string()))?;
        let port = parse_env("AGENCIA_PORT", "3002")?;
        let base_url = get_required_env("AGENCIA_BASE_URL")?;
        let data_dir = get_optional_env("AGENCIA_DATA_DIR").map(PathBuf::from);
        let bootstrap_admin = BootstrapAdmin::from_env()?;
        let seed_demo_users = parse_env("AGENCIA_SEED_DEMO_USERS", "false")?;
        let services = ServiceSettings::from_env()?;
        let pix = PixConfig::from_env()?;
        let email = EmailProviderConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            data_dir,
            bootstrap_admin,
            seed_demo_users,
            services,
            pix,
            email,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BootstrapAdmin {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_email = get_required_env("AGENCIA_ADMIN_EMAIL")?;
        let email = Email::parse(&raw_email).map_err(|e| {
            ConfigError::InvalidEnvVar("AGENCIA_ADMIN_EMAIL".to_string(), e.to_string())
        })?;

        let credential = if let Some(hash) = get_optional_env("AGENCIA_ADMIN_PASSWORD_HASH") {
            if !hash.starts_with("$argon2") {
                return Err(ConfigError::InvalidEnvVar(
                    "AGENCIA_ADMIN_PASSWORD_HASH".to_string(),
                    "must be an argon2 PHC string".to_string(),
                ));
            }
            AdminCredential::Hash(hash)
        } else {
            AdminCredential::Password(get_validated_secret("AGENCIA_ADMIN_PASSWORD")?)
        };

        Ok(Self { email, credential })
    }
}

impl ServiceSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timezone = get_env_or_default("AGENCIA_TIMEZONE_OFFSET", DEFAULT_TIMEZONE_OFFSET)
            .parse::<FixedOffset>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("AGENCIA_TIMEZONE_OFFSET".to_string(), e.to_string())
            })?;
        let cache_ttl: u64 = parse_env("ANALYTICS_CACHE_TTL_SECS", "300")?;
        let retention_days: i64 = parse_env("BACKUP_RETENTION_DAYS", "30")?;
        if retention_days < 1 {
            return Err(ConfigError::InvalidEnvVar(
                "BACKUP_RETENTION_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let step_delay_ms: u64 = parse_env("BACKUP_STEP_DELAY_MS", "500")?;
        let feed_enabled = parse_env("NOTIFICATION_FEED_ENABLED", "true")?;

        Ok(Self {
            timezone,
            analytics_cache_ttl: Duration::from_secs(cache_ttl),
            backup_retention_days: retention_days,
            backup_step_delay: Duration::from_millis(step_delay_ms),
            feed_enabled,
            ..defaults
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

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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
    let len = s.chars().count() as f64;
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
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3002,
            base_url: "http://localhost:3002".to_string(),
            data_dir: None,
            bootstrap_admin: BootstrapAdmin {
                email: Email::parse("admin@agenciacheck.com.br").unwrap(),
                credential: AdminCredential::Password(SecretString::from("kT9#vQ2!mZ7@pL4$")),
            },
            seed_demo_users: false,
            services: ServiceSettings::default(),
            pix: None,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            tls: None,
        }
    }

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
        let result = validate_secret_strength("minha-senha-forte-123", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let mut config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
        assert!(!config.is_secure());

        config.base_url = "https://painel.agenciacheck.com.br".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_default_service_settings() {
        let settings = ServiceSettings::default();
        assert_eq!(settings.timezone.local_minus_utc(), -3 * 3600);
        assert_eq!(settings.notification_capacity, 1000);
        assert_eq!(settings.feed_max_reconnect_attempts, 5);
        assert_eq!(settings.backup_retention_days, 30);
    }

    #[test]
    fn test_pix_config_debug_redacts_secrets() {
        let config = PixConfig {
            client_id: "pix-client".to_string(),
            client_secret: SecretString::from("super_private_pix_value"),
            pix_key: "financeiro@agenciacheck.com.br".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("pix-client"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_private_pix_value"));
    }

    #[test]
    fn test_admin_credential_debug_redacts() {
        let debug_output = format!("{:?}", test_config().bootstrap_admin);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("kT9#vQ2"));
    }
}
