//! Configuration types, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default bound on the remote classifier call.
const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 5_000;

/// Default notification retry worker tick.
const DEFAULT_NOTIFY_INTERVAL_SECS: u64 = 60;

/// Remote classifier/extractor service configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Base URL of the classification service.
    pub base_url: String,
    /// Bearer token for the service.
    pub api_key: SecretString,
    /// Hard bound on a single classify/extract call.
    pub timeout: Duration,
}

/// SMTP settings for outbound notifications.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Path to the libSQL database file.
    pub db_path: String,
    /// Remote classifier, if configured. `None` means heuristics only.
    pub classifier: Option<ClassifierConfig>,
    /// SMTP settings, if configured. `None` disables outbound notifications.
    pub smtp: Option<SmtpConfig>,
    /// Optional JSON file overriding the built-in security pattern set.
    pub security_patterns_path: Option<String>,
    /// Notification retry worker interval.
    pub notify_interval: Duration,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = parse_env("INBOX_PORT", 8080)?;

        let db_path =
            std::env::var("INBOX_DB_PATH").unwrap_or_else(|_| "./data/atelier-inbox.db".into());

        let classifier = match std::env::var("INBOX_CLASSIFIER_URL") {
            Ok(base_url) => {
                let api_key = std::env::var("INBOX_CLASSIFIER_API_KEY")
                    .map_err(|_| ConfigError::MissingEnvVar("INBOX_CLASSIFIER_API_KEY".into()))?;
                let timeout_ms: u64 =
                    parse_env("INBOX_CLASSIFIER_TIMEOUT_MS", DEFAULT_CLASSIFIER_TIMEOUT_MS)?;
                Some(ClassifierConfig {
                    base_url,
                    api_key: SecretString::from(api_key),
                    timeout: Duration::from_millis(timeout_ms),
                })
            }
            Err(_) => None,
        };

        let smtp = match std::env::var("INBOX_SMTP_HOST") {
            Ok(host) => {
                let port: u16 = parse_env("INBOX_SMTP_PORT", 587)?;
                let username = std::env::var("INBOX_SMTP_USERNAME").unwrap_or_default();
                let password = std::env::var("INBOX_SMTP_PASSWORD").unwrap_or_default();
                let from_address = std::env::var("INBOX_SMTP_FROM")
                    .unwrap_or_else(|_| username.clone());
                Some(SmtpConfig {
                    host,
                    port,
                    username,
                    password: SecretString::from(password),
                    from_address,
                })
            }
            Err(_) => None,
        };

        let security_patterns_path = std::env::var("INBOX_SECURITY_PATTERNS").ok();

        let notify_interval_secs: u64 =
            parse_env("INBOX_NOTIFY_INTERVAL_SECS", DEFAULT_NOTIFY_INTERVAL_SECS)?;

        Ok(Self {
            port,
            db_path,
            classifier,
            smtp,
            security_patterns_path,
            notify_interval: Duration::from_secs(notify_interval_secs),
        })
    }
}

/// Parse an env var with a default, erroring on malformed values instead of
/// silently falling back.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("could not parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_uses_default_when_unset() {
        let v: u16 = parse_env("INBOX_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn parse_env_rejects_garbage() {
        // SAFETY: test-only env mutation, unique key.
        unsafe { std::env::set_var("INBOX_TEST_GARBAGE_VAR", "not-a-number") };
        let v: Result<u16, _> = parse_env("INBOX_TEST_GARBAGE_VAR", 1);
        assert!(v.is_err());
        unsafe { std::env::remove_var("INBOX_TEST_GARBAGE_VAR") };
    }
}
