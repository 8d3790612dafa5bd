//! Staff notifications — SMTP via lettre, with a persistent retry queue.
//!
//! Delivery is best-effort: a notification failure never fails the pipeline.
//! Failed sends land in the `notification_queue` table and a background
//! worker retries them with exponential backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;
use crate::error::NotifyError;
use crate::store::traits::{Database, EmailIntegration, EntryStatus, ProcessingLogEntry};

/// Give up on a notification after this many failed attempts.
const MAX_ATTEMPTS: u32 = 5;
/// First retry delay; doubles on each subsequent failure.
const RETRY_BASE: Duration = Duration::from_secs(60);
/// Notifications pulled from the queue per worker tick.
const BATCH_SIZE: usize = 20;

// ── Mailer ──────────────────────────────────────────────────────────

/// Outbound mail transport. Blocking — call via `spawn_blocking`.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// SMTP mailer backed by lettre's blocking transport.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| NotifyError::Smtp(format!("relay setup failed: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                NotifyError::InvalidAddress {
                    address: self.config.from_address.clone(),
                    reason: format!("{e}"),
                }
            })?)
            .to(to.parse().map_err(|e| NotifyError::InvalidAddress {
                address: to.to_string(),
                reason: format!("{e}"),
            })?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotifyError::Smtp(format!("failed to build message: {e}")))?;

        transport
            .send(&email)
            .map_err(|e| NotifyError::Smtp(format!("send failed: {e}")))?;

        info!(to, "notification sent");
        Ok(())
    }
}

// ── Message composition ─────────────────────────────────────────────

/// Subject and body for a finished delivery. Blocked deliveries get an
/// elevated `[SECURITY]` subject so staff can filter on it.
fn compose(entry: &ProcessingLogEntry) -> (String, String) {
    let subject = match entry.status {
        EntryStatus::Completed => {
            let what = entry.record_type.as_deref().unwrap_or("record");
            format!("[inbox] {what} created: {}", entry.subject)
        }
        EntryStatus::Pending => format!("[inbox] needs confirmation: {}", entry.subject),
        EntryStatus::Failed => format!("[inbox] processing failed: {}", entry.subject),
        EntryStatus::Blocked => format!("[SECURITY] blocked email from {}", entry.sender),
    };

    let mut lines = vec![
        format!("From: {}", entry.sender),
        format!("Subject: {}", entry.subject),
        format!("Status: {}", entry.status.as_str()),
    ];
    if let Some(domain) = entry.domain {
        lines.push(format!("Category: {}", domain.as_str()));
    }
    if let Some(confidence) = entry.confidence {
        lines.push(format!("Confidence: {confidence:.2}"));
    }
    if let Some(record) = entry.record_ref() {
        lines.push(format!(
            "Record: {} {}",
            record.record_type.as_str(),
            record.id
        ));
    }
    if let Some(summary) = &entry.security_summary {
        lines.push(format!("Security: {summary}"));
    }
    if let Some(error) = &entry.error {
        lines.push(format!("Error: {error}"));
    }
    lines.push(format!("Log entry: {}", entry.id));

    (subject, lines.join("\n"))
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Sends the per-delivery staff notification, falling back to the retry
/// queue when SMTP is down.
pub struct NotificationDispatcher {
    db: Arc<dyn Database>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl NotificationDispatcher {
    pub fn new(db: Arc<dyn Database>, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self { db, mailer }
    }

    /// Notify the integration's staff address about a finished delivery.
    /// Never propagates failure to the caller.
    pub async fn notify(&self, integration: &EmailIntegration, entry: &ProcessingLogEntry) {
        let Some(recipient) = integration.notify_address.clone() else {
            debug!(integration = %integration.id, "no notify address configured");
            return;
        };
        let (subject, body) = compose(entry);

        let Some(mailer) = self.mailer.clone() else {
            debug!("smtp not configured, dropping notification");
            return;
        };

        let (to, subj, text) = (recipient.clone(), subject.clone(), body.clone());
        let sent = tokio::task::spawn_blocking(move || mailer.send(&to, &subj, &text)).await;

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, recipient, "notification failed, queueing for retry");
                if let Err(e) = self
                    .db
                    .enqueue_notification(
                        &recipient,
                        &subject,
                        &body,
                        Utc::now() + RETRY_BASE,
                    )
                    .await
                {
                    warn!(error = %e, "failed to enqueue notification");
                }
            }
            Err(e) => warn!(error = %e, "notification task panicked"),
        }
    }
}

// ── Retry worker ────────────────────────────────────────────────────

/// One pass over the queue: send everything due at `now`. Returns the
/// number of notifications delivered.
pub async fn deliver_due(
    db: &Arc<dyn Database>,
    mailer: &Arc<dyn Mailer>,
    now: DateTime<Utc>,
) -> usize {
    let due = match db.due_notifications(now, BATCH_SIZE).await {
        Ok(due) => due,
        Err(e) => {
            warn!(error = %e, "failed to read notification queue");
            return 0;
        }
    };

    let mut sent = 0;
    for notification in due {
        let mailer = Arc::clone(mailer);
        let (to, subject, body) = (
            notification.recipient.clone(),
            notification.subject.clone(),
            notification.body.clone(),
        );
        let result =
            tokio::task::spawn_blocking(move || mailer.send(&to, &subject, &body)).await;

        match result {
            Ok(Ok(())) => {
                if let Err(e) = db.mark_notification_sent(notification.id).await {
                    warn!(error = %e, "failed to mark notification sent");
                }
                sent += 1;
            }
            Ok(Err(e)) => {
                let attempts = notification.attempts + 1;
                let next = if attempts >= MAX_ATTEMPTS {
                    warn!(
                        id = %notification.id,
                        attempts,
                        "notification exhausted its retries"
                    );
                    None
                } else {
                    // Exponential backoff: 60s, 120s, 240s, ...
                    Some(now + RETRY_BASE * 2u32.pow(notification.attempts))
                };
                if let Err(e) = db
                    .mark_notification_failed(notification.id, &e.to_string(), next)
                    .await
                {
                    warn!(error = %e, "failed to record notification failure");
                }
            }
            Err(e) => warn!(error = %e, "notification task panicked"),
        }
    }
    sent
}

/// Spawn the queue-draining worker. Returns the task handle and a
/// shutdown flag; set the flag to stop the loop at the next tick.
pub fn spawn_notification_worker(
    db: Arc<dyn Database>,
    mailer: Arc<dyn Mailer>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "notification worker started");
        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;
            if flag.load(Ordering::Relaxed) {
                info!("notification worker shutting down");
                return;
            }
            let delivered = deliver_due(&db, &mailer, Utc::now()).await;
            if delivered > 0 {
                debug!(delivered, "retried queued notifications");
            }
        }
    });

    (handle, shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use uuid::Uuid;

    use crate::pipeline::types::{DomainLabel, DomainScope};
    use crate::security::RiskLevel;
    use crate::store::LibSqlBackend;

    /// Mailer double: scripted outcomes, records every send.
    struct ScriptedMailer {
        sends: Mutex<Vec<(String, String)>>,
        fail: Mutex<u32>,
    }

    impl ScriptedMailer {
        fn new(failures: u32) -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                fail: Mutex::new(failures),
            }
        }
    }

    impl Mailer for ScriptedMailer {
        fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
            let mut fail = self.fail.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(NotifyError::Smtp("scripted failure".into()));
            }
            self.sends
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn entry(status: EntryStatus) -> ProcessingLogEntry {
        ProcessingLogEntry {
            id: Uuid::new_v4(),
            message_id: "m-1".into(),
            integration_id: None,
            sender: "jane@example.com".into(),
            subject: "Ring quote".into(),
            domain: Some(DomainLabel::Quote),
            status,
            confidence: Some(0.9),
            record_type: Some("quote".into()),
            record_id: Some(Uuid::new_v4()),
            error: None,
            security_level: RiskLevel::None,
            security_summary: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn completed_subject_names_the_record() {
        let (subject, body) = compose(&entry(EntryStatus::Completed));
        assert!(subject.contains("quote created"));
        assert!(body.contains("From: jane@example.com"));
        assert!(body.contains("Confidence: 0.90"));
        assert!(body.contains("Record: quote"));
    }

    #[test]
    fn blocked_subject_is_elevated() {
        let mut e = entry(EntryStatus::Blocked);
        e.security_level = RiskLevel::Critical;
        e.security_summary = Some("instruction override".into());
        let (subject, body) = compose(&e);
        assert!(subject.starts_with("[SECURITY]"));
        assert!(subject.contains("jane@example.com"));
        assert!(body.contains("instruction override"));
    }

    #[test]
    fn pending_subject_asks_for_confirmation() {
        let (subject, _) = compose(&entry(EntryStatus::Pending));
        assert!(subject.contains("needs confirmation"));
    }

    #[tokio::test]
    async fn failed_send_lands_in_queue() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mailer = Arc::new(ScriptedMailer::new(1));
        let dispatcher =
            NotificationDispatcher::new(Arc::clone(&db), Some(mailer.clone() as Arc<dyn Mailer>));

        let mut integration =
            EmailIntegration::new("intake@x.com", DomainScope::Fixed(DomainLabel::Quote));
        integration.notify_address = Some("staff@x.com".into());

        dispatcher.notify(&integration, &entry(EntryStatus::Completed)).await;

        assert!(mailer.sends.lock().unwrap().is_empty());
        let due = db
            .due_notifications(Utc::now() + chrono::Duration::minutes(2), 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].recipient, "staff@x.com");
    }

    #[tokio::test]
    async fn worker_pass_drains_queue() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let now = Utc::now();
        db.enqueue_notification("staff@x.com", "s1", "b1", now)
            .await
            .unwrap();
        db.enqueue_notification("staff@x.com", "s2", "b2", now)
            .await
            .unwrap();

        let mailer: Arc<dyn Mailer> = Arc::new(ScriptedMailer::new(0));
        assert_eq!(deliver_due(&db, &mailer, now).await, 2);
        assert!(db.due_notifications(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_back_off_then_give_up() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let start = Utc::now();
        db.enqueue_notification("staff@x.com", "s", "b", start)
            .await
            .unwrap();

        let mailer: Arc<dyn Mailer> = Arc::new(ScriptedMailer::new(u32::MAX));
        let mut now = start;
        for _ in 0..MAX_ATTEMPTS {
            // Jump past whatever backoff was scheduled.
            now += chrono::Duration::days(1);
            assert_eq!(deliver_due(&db, &mailer, now).await, 0);
        }

        // Attempts exhausted: nothing is ever due again.
        now += chrono::Duration::days(30);
        assert!(db.due_notifications(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_notify_address_sends_nothing() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mailer = Arc::new(ScriptedMailer::new(0));
        let dispatcher =
            NotificationDispatcher::new(Arc::clone(&db), Some(mailer.clone() as Arc<dyn Mailer>));

        let integration = EmailIntegration::new("intake@x.com", DomainScope::AutoDetect);
        dispatcher.notify(&integration, &entry(EntryStatus::Completed)).await;

        assert!(mailer.sends.lock().unwrap().is_empty());
        assert!(db
            .due_notifications(Utc::now() + chrono::Duration::hours(1), 10)
            .await
            .unwrap()
            .is_empty());
    }
}
