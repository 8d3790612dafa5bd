//! Pipeline orchestrator — drives one webhook delivery end to end.
//!
//! Stage order: idempotency check, integration snapshot, security scan,
//! classification, extraction, scoring, routing, record creation, log
//! finalization, notification. Every delivery that opens a log entry also
//! finalizes it; the webhook only errors when even the entry cannot be
//! persisted.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::EmailClassifier;
use crate::error::{DatabaseError, PipelineError};
use crate::notify::NotificationDispatcher;
use crate::pipeline::extract::{ExtractionOutcome, ExtractorSet};
use crate::pipeline::routing::{Route, RoutingPolicy};
use crate::pipeline::scoring::ConfidenceScorer;
use crate::pipeline::types::{ClassificationResult, DomainLabel, InboundEmail};
use crate::records::{RecordCreator, RecordInserter, RecordRef, RecordType};
use crate::security::{SecurityScanner, SecurityVerdict};
use crate::store::traits::{Database, EmailIntegration, EntryStatus, LogOutcome};

/// What one delivery produced, echoed in the webhook response.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessingOutcome {
    pub entry_id: Uuid,
    pub status: EntryStatus,
    pub record: Option<RecordRef>,
    /// True when this message id was already processed; `record` then
    /// points at the original delivery's record.
    pub duplicate: bool,
}

/// The inbound email pipeline.
pub struct EmailProcessor {
    db: Arc<dyn Database>,
    scanner: SecurityScanner,
    classifier: EmailClassifier,
    scorer: ConfidenceScorer,
    policy: RoutingPolicy,
    extractors: ExtractorSet,
    creator: RecordCreator,
    dispatcher: NotificationDispatcher,
}

impl EmailProcessor {
    pub fn new(
        db: Arc<dyn Database>,
        inserter: Arc<dyn RecordInserter>,
        scanner: SecurityScanner,
        classifier: EmailClassifier,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            scanner,
            classifier,
            scorer: ConfidenceScorer::new(),
            policy: RoutingPolicy::new(),
            extractors: ExtractorSet::new(),
            creator: RecordCreator::new(inserter),
            dispatcher,
        }
    }

    /// Process one delivery. Redelivering the same message id returns the
    /// original outcome without creating anything.
    pub async fn process(
        &self,
        email: &InboundEmail,
    ) -> Result<ProcessingOutcome, PipelineError> {
        // Fast path for redeliveries; the unique constraint below catches
        // the racy remainder.
        if let Some(existing) = self.db.find_log_entry_by_message_id(&email.message_id).await? {
            info!(message_id = %email.message_id, "duplicate delivery, echoing original outcome");
            return Ok(ProcessingOutcome {
                entry_id: existing.id,
                status: existing.status,
                record: existing.record_ref(),
                duplicate: true,
            });
        }

        // One snapshot read per delivery; dashboard edits mid-flight
        // never partially apply.
        let integration = self.db.get_integration_by_address(&email.to).await?;
        let integration = match integration {
            Some(i) if i.active => i,
            _ => return self.reject_unknown_recipient(email).await,
        };

        let entry_id = match self
            .db
            .open_log_entry(&email.message_id, Some(integration.id), &email.from, &email.subject)
            .await
        {
            Ok(id) => id,
            Err(DatabaseError::Constraint(_)) => {
                // Lost the race against a concurrent delivery of the same
                // message. Echo whatever it decided.
                let existing = self
                    .db
                    .find_log_entry_by_message_id(&email.message_id)
                    .await?
                    .ok_or_else(|| {
                        PipelineError::Persistence(DatabaseError::Query(
                            "log entry vanished after constraint violation".into(),
                        ))
                    })?;
                return Ok(ProcessingOutcome {
                    entry_id: existing.id,
                    status: existing.status,
                    record: existing.record_ref(),
                    duplicate: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        // Security gate runs before any content interpretation.
        let verdict = self.scanner.scan(&email.subject, &email.body);
        if verdict.blocks() {
            warn!(
                message_id = %email.message_id,
                sender = %email.from,
                level = verdict.level.as_str(),
                "delivery blocked by security scan"
            );
            let outcome = LogOutcome {
                record_type: Some(RecordType::SecurityAlert.as_str().into()),
                security_level: verdict.level,
                security_summary: verdict.summary(),
                ..LogOutcome::new(EntryStatus::Blocked)
            };
            return self.finish(entry_id, &integration, outcome).await;
        }

        let classification = self
            .classifier
            .classify(integration.scope, &email.subject, &email.body)
            .await;

        let extraction = match self.extractors.for_label(classification.label) {
            Some(extractor) => {
                let mut outcome = extractor.extract(&email.body, &email.attachments);
                if !outcome.gaps().is_empty() {
                    if let Some(remote) = self
                        .classifier
                        .extract_remote(classification.label, &email.body)
                        .await
                    {
                        outcome.merge_remote(&remote);
                    }
                }
                Some(outcome)
            }
            None => None,
        };

        let score = match &extraction {
            Some(extraction) => self.scorer.score(&classification, extraction),
            None => 0.0,
        };

        let route = self.policy.route(&integration, &verdict, &classification, score);
        info!(
            message_id = %email.message_id,
            label = classification.label.as_str(),
            score,
            route = route.label(),
            "delivery routed"
        );

        let outcome = match route {
            Route::Blocked => LogOutcome {
                record_type: Some(RecordType::SecurityAlert.as_str().into()),
                security_level: verdict.level,
                security_summary: verdict.summary(),
                ..LogOutcome::new(EntryStatus::Blocked)
            },
            Route::AutoCreate => {
                // Routing guarantees a known label here, so extraction exists.
                let extraction = extraction.as_ref().ok_or_else(|| PipelineError::Extraction {
                    domain: classification.label.as_str().into(),
                    reason: "no extractor for routed label".into(),
                })?;
                match self.creator.create(email, extraction, false, entry_id).await {
                    Ok(record) => LogOutcome {
                        domain: Some(classification.label),
                        confidence: Some(score),
                        record_type: Some(record.record_type.as_str().into()),
                        record_id: Some(record.id),
                        security_level: verdict.level,
                        security_summary: verdict.summary(),
                        ..LogOutcome::new(EntryStatus::Completed)
                    },
                    Err(e) => {
                        warn!(error = %e, "record creation failed");
                        LogOutcome {
                            security_level: verdict.level,
                            ..LogOutcome::failed(e.to_string())
                        }
                    }
                }
            }
            Route::QueueForConfirmation { reason } => {
                self.queue_for_confirmation(
                    email,
                    &classification,
                    extraction.as_ref(),
                    &verdict,
                    score,
                    entry_id,
                    reason,
                )
                .await
            }
        };

        self.finish(entry_id, &integration, outcome).await
    }

    /// Queue route: a pending-review record stub where extraction exists,
    /// just the pending log entry otherwise. The entry stays non-terminal
    /// until a human resolves it.
    async fn queue_for_confirmation(
        &self,
        email: &InboundEmail,
        classification: &ClassificationResult,
        extraction: Option<&ExtractionOutcome>,
        verdict: &SecurityVerdict,
        score: f32,
        entry_id: Uuid,
        reason: String,
    ) -> LogOutcome {
        let record = match extraction {
            Some(extraction) => {
                match self.creator.create(email, extraction, true, entry_id).await {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(error = %e, "pending-review stub creation failed");
                        return LogOutcome {
                            security_level: verdict.level,
                            ..LogOutcome::failed(e.to_string())
                        };
                    }
                }
            }
            None => None,
        };

        let domain = match classification.label {
            DomainLabel::Unknown => None,
            label => Some(label),
        };
        LogOutcome {
            domain,
            confidence: Some(score),
            record_type: record.map(|r| r.record_type.as_str().to_string()),
            record_id: record.map(|r| r.id),
            error: Some(reason),
            security_level: verdict.level,
            security_summary: verdict.summary(),
            ..LogOutcome::new(EntryStatus::Pending)
        }
    }

    /// Deliveries to unconfigured or deactivated addresses still get a
    /// failed log entry so operators can see them.
    async fn reject_unknown_recipient(
        &self,
        email: &InboundEmail,
    ) -> Result<ProcessingOutcome, PipelineError> {
        warn!(to = %email.to, message_id = %email.message_id, "no active integration for recipient");
        let entry_id = match self
            .db
            .open_log_entry(&email.message_id, None, &email.from, &email.subject)
            .await
        {
            Ok(id) => id,
            Err(DatabaseError::Constraint(_)) => {
                let existing = self
                    .db
                    .find_log_entry_by_message_id(&email.message_id)
                    .await?
                    .ok_or_else(|| {
                        PipelineError::Persistence(DatabaseError::Query(
                            "log entry vanished after constraint violation".into(),
                        ))
                    })?;
                return Ok(ProcessingOutcome {
                    entry_id: existing.id,
                    status: existing.status,
                    record: existing.record_ref(),
                    duplicate: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let error = PipelineError::UnknownIntegration(email.to.clone()).to_string();
        self.db
            .finalize_log_entry(entry_id, &LogOutcome::failed(error))
            .await?;
        Ok(ProcessingOutcome {
            entry_id,
            status: EntryStatus::Failed,
            record: None,
            duplicate: false,
        })
    }

    /// Write the outcome, then notify staff from the fresh row.
    async fn finish(
        &self,
        entry_id: Uuid,
        integration: &EmailIntegration,
        outcome: LogOutcome,
    ) -> Result<ProcessingOutcome, PipelineError> {
        self.db.finalize_log_entry(entry_id, &outcome).await?;

        if let Some(entry) = self.db.find_log_entry(entry_id).await? {
            self.dispatcher.notify(integration, &entry).await;
            Ok(ProcessingOutcome {
                entry_id,
                status: entry.status,
                record: entry.record_ref(),
                duplicate: false,
            })
        } else {
            Err(PipelineError::Persistence(DatabaseError::NotFound {
                entity: "processing_log".into(),
                id: entry_id.to_string(),
            }))
        }
    }
}
