//! Error types for Atelier Inbox.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid security pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Remote classifier/extractor service errors.
///
/// These are always recoverable from the pipeline's point of view — the
/// caller degrades to heuristics or an `Unknown` label instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    RequestFailed(String),

    #[error("Classifier returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Classifier call timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline-stage errors.
///
/// Only `Persistence` is fatal for a delivery (the webhook returns 500 so
/// the provider redelivers). Everything below it downgrades to the
/// queue-for-confirmation route.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Unknown recipient address: {0}")]
    UnknownIntegration(String),

    #[error("Extraction failed for domain {domain}: {reason}")]
    Extraction { domain: String, reason: String },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),
}

/// Notification delivery errors.
///
/// Isolated by design: a failed notification never rolls back the record
/// or the processing-log entry it announces.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid recipient address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("SMTP send failed: {0}")]
    Smtp(String),

    #[error("Notification channel is not configured")]
    NotConfigured,
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
