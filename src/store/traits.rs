//! Unified `Database` trait — single async interface for all persistence.
//!
//! Extends the insert-only [`RecordInserter`] surface with integration
//! configuration, the append-only processing log, and the notification
//! retry queue. Pipeline components that must not mutate records receive
//! only the `RecordInserter` view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{DomainLabel, DomainScope};
use crate::records::{RecordInserter, RecordRef};
use crate::security::RiskLevel;

/// Default threshold for new integrations; operators tune per address.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

// ── Email integrations ──────────────────────────────────────────────

/// A configured inbound address with its routing policy.
///
/// Read as a whole row at the start of each delivery so concurrent
/// dashboard edits never partially apply mid-pipeline.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EmailIntegration {
    pub id: Uuid,
    pub address: String,
    pub scope: DomainScope,
    pub active: bool,
    pub auto_process: bool,
    pub require_confirmation: bool,
    pub confidence_threshold: f32,
    pub notify_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailIntegration {
    /// New integration with conservative defaults: active, but queueing
    /// everything until an operator enables auto-processing.
    pub fn new(address: impl Into<String>, scope: DomainScope) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            scope,
            active: true,
            auto_process: false,
            require_confirmation: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            notify_address: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Processing log ──────────────────────────────────────────────────

/// Lifecycle status of a processing-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Open, or parked on the queue-for-confirmation route.
    Pending,
    Completed,
    Failed,
    Blocked,
}

impl EntryStatus {
    /// Terminal entries are immutable.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "blocked" => Self::Blocked,
            _ => Self::Pending,
        }
    }
}

/// One row of the append-only processing ledger. Exactly one entry exists
/// per provider message id.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessingLogEntry {
    pub id: Uuid,
    pub message_id: String,
    pub integration_id: Option<Uuid>,
    pub sender: String,
    pub subject: String,
    pub domain: Option<DomainLabel>,
    pub status: EntryStatus,
    pub confidence: Option<f32>,
    pub record_type: Option<String>,
    pub record_id: Option<Uuid>,
    pub error: Option<String>,
    pub security_level: RiskLevel,
    pub security_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingLogEntry {
    /// Reference to the record this entry created, if any.
    pub fn record_ref(&self) -> Option<RecordRef> {
        let record_type = crate::records::RecordType::parse(self.record_type.as_deref()?)?;
        let id = self.record_id?;
        Some(RecordRef { record_type, id })
    }
}

/// Everything written when a delivery leaves the pipeline.
#[derive(Debug, Clone)]
pub struct LogOutcome {
    pub status: EntryStatus,
    pub domain: Option<DomainLabel>,
    pub confidence: Option<f32>,
    pub record_type: Option<String>,
    pub record_id: Option<Uuid>,
    pub error: Option<String>,
    pub security_level: RiskLevel,
    pub security_summary: Option<String>,
}

impl LogOutcome {
    pub fn new(status: EntryStatus) -> Self {
        Self {
            status,
            domain: None,
            confidence: None,
            record_type: None,
            record_id: None,
            error: None,
            security_level: RiskLevel::None,
            security_summary: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(EntryStatus::Failed)
        }
    }
}

/// Filter for the dashboard's log-viewer queries.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub status: Option<EntryStatus>,
    pub domain: Option<DomainLabel>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// 0 means the backend default (100).
    pub limit: usize,
}

// ── Notification queue ──────────────────────────────────────────────

/// A notification awaiting (re)delivery.
#[derive(Debug, Clone)]
pub struct QueuedNotification {
    pub id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Database trait ──────────────────────────────────────────────────

/// Backend-agnostic persistence trait.
///
/// Supertrait [`RecordInserter`] carries the insert-only record surface.
#[async_trait]
pub trait Database: RecordInserter {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Integrations ────────────────────────────────────────────────

    async fn insert_integration(
        &self,
        integration: &EmailIntegration,
    ) -> Result<(), DatabaseError>;

    async fn get_integration(&self, id: Uuid)
        -> Result<Option<EmailIntegration>, DatabaseError>;

    /// Consistent snapshot read used once per delivery.
    async fn get_integration_by_address(
        &self,
        address: &str,
    ) -> Result<Option<EmailIntegration>, DatabaseError>;

    async fn list_integrations(&self) -> Result<Vec<EmailIntegration>, DatabaseError>;

    /// Full-row replacement, keyed by id.
    async fn update_integration(
        &self,
        integration: &EmailIntegration,
    ) -> Result<(), DatabaseError>;

    async fn delete_integration(&self, id: Uuid) -> Result<(), DatabaseError>;

    // ── Processing log ──────────────────────────────────────────────

    /// Open a pending entry for a delivery. The unique constraint on
    /// `message_id` makes this the idempotency gate: a concurrent or
    /// repeated delivery gets `DatabaseError::Constraint`.
    async fn open_log_entry(
        &self,
        message_id: &str,
        integration_id: Option<Uuid>,
        sender: &str,
        subject: &str,
    ) -> Result<Uuid, DatabaseError>;

    /// Write a delivery's outcome. Fails with `Constraint` when the entry
    /// already reached a terminal status — terminal entries are immutable.
    async fn finalize_log_entry(
        &self,
        id: Uuid,
        outcome: &LogOutcome,
    ) -> Result<(), DatabaseError>;

    async fn find_log_entry(&self, id: Uuid)
        -> Result<Option<ProcessingLogEntry>, DatabaseError>;

    async fn find_log_entry_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<ProcessingLogEntry>, DatabaseError>;

    /// Dashboard log viewer: filter by status, domain label, date range.
    async fn query_log_entries(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<ProcessingLogEntry>, DatabaseError>;

    // ── Notification queue ──────────────────────────────────────────

    async fn enqueue_notification(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Uuid, DatabaseError>;

    /// Queued notifications due at or before `now`, oldest first.
    async fn due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedNotification>, DatabaseError>;

    async fn mark_notification_sent(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Record a failed attempt. `next_attempt_at = None` gives up on the
    /// notification for good.
    async fn mark_notification_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError>;
}
