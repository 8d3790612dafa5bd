//! libSQL backend — async `Database` trait implementation.
//!
//! Local-file or in-memory databases via libsql's native async API. All
//! datetimes are written as RFC 3339 text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{DomainLabel, DomainScope};
use crate::records::{
    NewCommunicationNote, NewCustomer, NewOrder, NewQuote, NewRepair, NewTradeIn, RecordInserter,
};
use crate::security::RiskLevel;
use crate::store::migrations;
use crate::store::traits::{
    Database, EmailIntegration, EntryStatus, LogFilter, LogOutcome, ProcessingLogEntry,
    QueuedNotification,
};

/// Default page size for log queries.
const DEFAULT_QUERY_LIMIT: usize = 100;

/// libSQL database backend.
///
/// Stores a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("failed to connect: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("failed to connect: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn query_err(e: libsql::Error) -> DatabaseError {
    let text = e.to_string();
    if text.contains("UNIQUE constraint") {
        DatabaseError::Constraint(text)
    } else {
        DatabaseError::Query(text)
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    warn!(value = s, "unparseable stored datetime, substituting epoch minimum");
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_f64(v: Option<f32>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Real(f64::from(v)),
        None => libsql::Value::Null,
    }
}

fn items_json(items: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

const INTEGRATION_COLUMNS: &str = "id, address, scope, active, auto_process, require_confirmation, confidence_threshold, notify_address, created_at, updated_at";

fn row_to_integration(row: &libsql::Row) -> Result<EmailIntegration, libsql::Error> {
    let id: String = row.get(0)?;
    let scope: String = row.get(2)?;
    let active: i64 = row.get(3)?;
    let auto_process: i64 = row.get(4)?;
    let require_confirmation: i64 = row.get(5)?;
    let threshold: f64 = row.get(6)?;
    let created: String = row.get(8)?;
    let updated: String = row.get(9)?;

    Ok(EmailIntegration {
        id: parse_uuid(&id),
        address: row.get(1)?,
        scope: DomainScope::parse(&scope),
        active: active != 0,
        auto_process: auto_process != 0,
        require_confirmation: require_confirmation != 0,
        confidence_threshold: threshold as f32,
        notify_address: row.get(7).ok().flatten(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

const LOG_COLUMNS: &str = "id, message_id, integration_id, sender, subject, domain, status, confidence, record_type, record_id, error, security_level, security_summary, created_at, updated_at";

fn row_to_log_entry(row: &libsql::Row) -> Result<ProcessingLogEntry, libsql::Error> {
    let id: String = row.get(0)?;
    let integration_id: Option<String> = row.get(2).ok().flatten();
    let domain: Option<String> = row.get(5).ok().flatten();
    let status: String = row.get(6)?;
    let confidence: Option<f64> = row.get(7).ok().flatten();
    let record_id: Option<String> = row.get(9).ok().flatten();
    let security_level: String = row.get(11)?;
    let created: String = row.get(13)?;
    let updated: String = row.get(14)?;

    Ok(ProcessingLogEntry {
        id: parse_uuid(&id),
        message_id: row.get(1)?,
        integration_id: integration_id.map(|s| parse_uuid(&s)),
        sender: row.get(3)?,
        subject: row.get(4)?,
        domain: domain.map(|s| DomainLabel::parse(&s)),
        status: EntryStatus::parse(&status),
        confidence: confidence.map(|c| c as f32),
        record_type: row.get(8).ok().flatten(),
        record_id: record_id.map(|s| parse_uuid(&s)),
        error: row.get(10).ok().flatten(),
        security_level: RiskLevel::parse(&security_level),
        security_summary: row.get(12).ok().flatten(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

fn row_to_notification(row: &libsql::Row) -> Result<QueuedNotification, libsql::Error> {
    let id: String = row.get(0)?;
    let attempts: i64 = row.get(4)?;
    let next_attempt: String = row.get(5)?;
    let created: String = row.get(7)?;

    Ok(QueuedNotification {
        id: parse_uuid(&id),
        recipient: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        attempts: attempts.max(0) as u32,
        next_attempt_at: parse_datetime(&next_attempt),
        last_error: row.get(6).ok().flatten(),
        created_at: parse_datetime(&created),
    })
}

// ── Insert-only record surface ──────────────────────────────────────

#[async_trait]
impl RecordInserter for LibSqlBackend {
    async fn find_customer(&self, email: &str) -> Result<Option<Uuid>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id FROM customers WHERE email = ?1 COLLATE NOCASE ORDER BY created_at ASC LIMIT 1",
                params![email],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let id: String = row.get(0).map_err(query_err)?;
                Ok(Some(parse_uuid(&id)))
            }
            None => Ok(None),
        }
    }

    async fn insert_customer(&self, new: &NewCustomer) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO customers (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    new.name.as_str(),
                    new.email.as_str(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn insert_quote(&self, new: &NewQuote) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO quotes (id, customer_id, request, items, budget, evidence, pending_review, log_entry_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    new.customer_id.to_string(),
                    new.request.as_str(),
                    items_json(&new.items)?,
                    opt_text(new.budget.map(|b| b.to_string()).as_deref()),
                    new.evidence_json.as_str(),
                    i64::from(new.pending_review),
                    new.log_entry_id.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn insert_order(&self, new: &NewOrder) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO orders (id, customer_id, items, quantity, needed_by, note, evidence, pending_review, log_entry_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id.to_string(),
                    new.customer_id.to_string(),
                    items_json(&new.items)?,
                    match new.quantity {
                        Some(q) => libsql::Value::Integer(i64::from(q)),
                        None => libsql::Value::Null,
                    },
                    opt_text(new.needed_by.as_deref()),
                    new.note.as_str(),
                    new.evidence_json.as_str(),
                    i64::from(new.pending_review),
                    new.log_entry_id.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn insert_repair(&self, new: &NewRepair) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let urgency = match new.urgency {
            crate::pipeline::extract::Urgency::Normal => "normal",
            crate::pipeline::extract::Urgency::Rush => "rush",
        };
        self.conn()
            .execute(
                "INSERT INTO repairs (id, customer_id, item, issue, urgency, evidence, pending_review, log_entry_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    new.customer_id.to_string(),
                    opt_text(new.item.as_deref()),
                    opt_text(new.issue.as_deref()),
                    urgency,
                    new.evidence_json.as_str(),
                    i64::from(new.pending_review),
                    new.log_entry_id.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn insert_trade_in(&self, new: &NewTradeIn) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO trade_ins (id, customer_id, item, metal, asking_value, evidence, pending_review, log_entry_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    new.customer_id.to_string(),
                    opt_text(new.item.as_deref()),
                    opt_text(new.metal.as_deref()),
                    opt_text(new.asking_value.map(|v| v.to_string()).as_deref()),
                    new.evidence_json.as_str(),
                    i64::from(new.pending_review),
                    new.log_entry_id.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn insert_communication_note(
        &self,
        new: &NewCommunicationNote,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO communication_notes (id, customer_id, topic, summary, evidence, pending_review, log_entry_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    new.customer_id.to_string(),
                    opt_text(new.topic.as_deref()),
                    new.summary.as_str(),
                    new.evidence_json.as_str(),
                    i64::from(new.pending_review),
                    new.log_entry_id.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }
}

// ── Database trait ──────────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::init_schema(self.conn()).await
    }

    // ── Integrations ────────────────────────────────────────────────

    async fn insert_integration(
        &self,
        integration: &EmailIntegration,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO integrations ({INTEGRATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    integration.id.to_string(),
                    integration.address.as_str(),
                    integration.scope.as_db_str(),
                    i64::from(integration.active),
                    i64::from(integration.auto_process),
                    i64::from(integration.require_confirmation),
                    f64::from(integration.confidence_threshold),
                    opt_text(integration.notify_address.as_deref()),
                    integration.created_at.to_rfc3339(),
                    integration.updated_at.to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_integration(
        &self,
        id: Uuid,
    ) -> Result<Option<EmailIntegration>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_integration(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn get_integration_by_address(
        &self,
        address: &str,
    ) -> Result<Option<EmailIntegration>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE address = ?1 COLLATE NOCASE"
                ),
                params![address],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_integration(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn list_integrations(&self) -> Result<Vec<EmailIntegration>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {INTEGRATION_COLUMNS} FROM integrations ORDER BY created_at ASC"),
                (),
            )
            .await
            .map_err(query_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            out.push(row_to_integration(&row).map_err(query_err)?);
        }
        Ok(out)
    }

    async fn update_integration(
        &self,
        integration: &EmailIntegration,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE integrations SET address = ?1, scope = ?2, active = ?3, auto_process = ?4,
                 require_confirmation = ?5, confidence_threshold = ?6, notify_address = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    integration.address.as_str(),
                    integration.scope.as_db_str(),
                    i64::from(integration.active),
                    i64::from(integration.auto_process),
                    i64::from(integration.require_confirmation),
                    f64::from(integration.confidence_threshold),
                    opt_text(integration.notify_address.as_deref()),
                    Utc::now().to_rfc3339(),
                    integration.id.to_string()
                ],
            )
            .await
            .map_err(query_err)?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "integration".into(),
                id: integration.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_integration(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM integrations WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    // ── Processing log ──────────────────────────────────────────────

    async fn open_log_entry(
        &self,
        message_id: &str,
        integration_id: Option<Uuid>,
        sender: &str,
        subject: &str,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO processing_log (id, message_id, integration_id, sender, subject, status, security_level, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 'none', ?6, ?7)",
                params![
                    id.to_string(),
                    message_id,
                    opt_text(integration_id.map(|i| i.to_string()).as_deref()),
                    sender,
                    subject,
                    now.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn finalize_log_entry(
        &self,
        id: Uuid,
        outcome: &LogOutcome,
    ) -> Result<(), DatabaseError> {
        // The status guard makes terminal entries immutable.
        let affected = self
            .conn()
            .execute(
                "UPDATE processing_log SET domain = ?1, status = ?2, confidence = ?3,
                 record_type = ?4, record_id = ?5, error = ?6, security_level = ?7,
                 security_summary = ?8, updated_at = ?9
                 WHERE id = ?10 AND status = 'pending'",
                params![
                    opt_text(outcome.domain.map(DomainLabel::as_str)),
                    outcome.status.as_str(),
                    opt_f64(outcome.confidence),
                    opt_text(outcome.record_type.as_deref()),
                    opt_text(outcome.record_id.map(|r| r.to_string()).as_deref()),
                    opt_text(outcome.error.as_deref()),
                    outcome.security_level.as_str(),
                    opt_text(outcome.security_summary.as_deref()),
                    Utc::now().to_rfc3339(),
                    id.to_string()
                ],
            )
            .await
            .map_err(query_err)?;

        if affected == 0 {
            return match self.find_log_entry(id).await? {
                Some(_) => Err(DatabaseError::Constraint(format!(
                    "log entry {id} is terminal and cannot be modified"
                ))),
                None => Err(DatabaseError::NotFound {
                    entity: "processing_log".into(),
                    id: id.to_string(),
                }),
            };
        }
        Ok(())
    }

    async fn find_log_entry(
        &self,
        id: Uuid,
    ) -> Result<Option<ProcessingLogEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {LOG_COLUMNS} FROM processing_log WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_log_entry(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn find_log_entry_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<ProcessingLogEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {LOG_COLUMNS} FROM processing_log WHERE message_id = ?1"),
                params![message_id],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_log_entry(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn query_log_entries(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<ProcessingLogEntry>, DatabaseError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<libsql::Value> = Vec::new();

        if let Some(status) = filter.status {
            args.push(libsql::Value::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(domain) = filter.domain {
            args.push(libsql::Value::Text(domain.as_str().to_string()));
            clauses.push(format!("domain = ?{}", args.len()));
        }
        if let Some(since) = filter.since {
            args.push(libsql::Value::Text(since.to_rfc3339()));
            clauses.push(format!("created_at >= ?{}", args.len()));
        }
        if let Some(until) = filter.until {
            args.push(libsql::Value::Text(until.to_rfc3339()));
            clauses.push(format!("created_at <= ?{}", args.len()));
        }

        let mut sql = format!("SELECT {LOG_COLUMNS} FROM processing_log");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        let limit = if filter.limit == 0 {
            DEFAULT_QUERY_LIMIT
        } else {
            filter.limit
        };
        args.push(libsql::Value::Integer(limit as i64));
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{}", args.len()));

        let mut rows = self.conn().query(&sql, args).await.map_err(query_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            out.push(row_to_log_entry(&row).map_err(query_err)?);
        }
        Ok(out)
    }

    // ── Notification queue ──────────────────────────────────────────

    async fn enqueue_notification(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO notification_queue (id, recipient, subject, body, status, attempts, next_attempt_at, last_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'queued', 0, ?5, NULL, ?6, ?7)",
                params![
                    id.to_string(),
                    recipient,
                    subject,
                    body,
                    next_attempt_at.to_rfc3339(),
                    now.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedNotification>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, recipient, subject, body, attempts, next_attempt_at, last_error, created_at
                 FROM notification_queue
                 WHERE status = 'queued' AND next_attempt_at <= ?1
                 ORDER BY next_attempt_at ASC LIMIT ?2",
                params![now.to_rfc3339(), limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            out.push(row_to_notification(&row).map_err(query_err)?);
        }
        Ok(out)
    }

    async fn mark_notification_sent(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE notification_queue SET status = 'sent', updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn mark_notification_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError> {
        let (status, next) = match next_attempt_at {
            Some(at) => ("queued", at.to_rfc3339()),
            None => ("failed", Utc::now().to_rfc3339()),
        };
        self.conn()
            .execute(
                "UPDATE notification_queue SET status = ?1, attempts = attempts + 1,
                 next_attempt_at = ?2, last_error = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    status,
                    next,
                    error,
                    Utc::now().to_rfc3339(),
                    id.to_string()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }
}
