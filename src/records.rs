//! Record creation — the pipeline's only mutation, and it is insert-only.
//!
//! The create-only rule is enforced structurally: [`RecordInserter`] is the
//! complete persistence surface this module sees, and it exposes inserts
//! plus one read-only customer lookup. There is no update or delete for
//! `RecordCreator` to call, so no code path here can touch a pre-existing
//! business record.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::extract::{ExtractedRecord, ExtractionOutcome, Urgency};
use crate::pipeline::types::InboundEmail;

// ── Record references ───────────────────────────────────────────────

/// Type of a record the pipeline created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Quote,
    Order,
    Repair,
    TradeIn,
    CommunicationNote,
    /// Log-only marker for blocked deliveries; no row behind it.
    SecurityAlert,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Order => "order",
            Self::Repair => "repair",
            Self::TradeIn => "trade_in",
            Self::CommunicationNote => "communication_note",
            Self::SecurityAlert => "security_alert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quote" => Some(Self::Quote),
            "order" => Some(Self::Order),
            "repair" => Some(Self::Repair),
            "trade_in" => Some(Self::TradeIn),
            "communication_note" => Some(Self::CommunicationNote),
            "security_alert" => Some(Self::SecurityAlert),
            _ => None,
        }
    }
}

/// Reference to a created record, echoed back on duplicate deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub record_type: RecordType,
    pub id: Uuid,
}

// ── New-record payloads ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct NewQuote {
    pub customer_id: Uuid,
    pub request: String,
    pub items: Vec<String>,
    pub budget: Option<Decimal>,
    pub evidence_json: String,
    pub pending_review: bool,
    pub log_entry_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub items: Vec<String>,
    pub quantity: Option<u32>,
    pub needed_by: Option<String>,
    pub note: String,
    pub evidence_json: String,
    pub pending_review: bool,
    pub log_entry_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewRepair {
    pub customer_id: Uuid,
    pub item: Option<String>,
    pub issue: Option<String>,
    pub urgency: Urgency,
    pub evidence_json: String,
    pub pending_review: bool,
    pub log_entry_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewTradeIn {
    pub customer_id: Uuid,
    pub item: Option<String>,
    pub metal: Option<String>,
    pub asking_value: Option<Decimal>,
    pub evidence_json: String,
    pub pending_review: bool,
    pub log_entry_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewCommunicationNote {
    pub customer_id: Uuid,
    pub topic: Option<String>,
    pub summary: String,
    pub evidence_json: String,
    pub pending_review: bool,
    pub log_entry_id: Uuid,
}

// ── Insert-only persistence surface ─────────────────────────────────

/// Insert-only view of the domain modules' storage.
///
/// Deliberately has no update or delete methods — see the module docs.
#[async_trait]
pub trait RecordInserter: Send + Sync {
    /// Read-only lookup by email. Ambiguous or absent matches must create
    /// a new customer rather than guess.
    async fn find_customer(&self, email: &str) -> Result<Option<Uuid>, DatabaseError>;

    async fn insert_customer(&self, new: &NewCustomer) -> Result<Uuid, DatabaseError>;
    async fn insert_quote(&self, new: &NewQuote) -> Result<Uuid, DatabaseError>;
    async fn insert_order(&self, new: &NewOrder) -> Result<Uuid, DatabaseError>;
    async fn insert_repair(&self, new: &NewRepair) -> Result<Uuid, DatabaseError>;
    async fn insert_trade_in(&self, new: &NewTradeIn) -> Result<Uuid, DatabaseError>;
    async fn insert_communication_note(
        &self,
        new: &NewCommunicationNote,
    ) -> Result<Uuid, DatabaseError>;
}

// ── Record creator ──────────────────────────────────────────────────

/// Turns an extraction into one inserted business record, linked back to
/// its processing-log entry for traceability.
pub struct RecordCreator {
    inserter: Arc<dyn RecordInserter>,
}

impl RecordCreator {
    pub fn new(inserter: Arc<dyn RecordInserter>) -> Self {
        Self { inserter }
    }

    /// Insert the record for this extraction. `pending_review` marks stubs
    /// created on the queue-for-confirmation route.
    pub async fn create(
        &self,
        email: &InboundEmail,
        extraction: &ExtractionOutcome,
        pending_review: bool,
        log_entry_id: Uuid,
    ) -> Result<RecordRef, DatabaseError> {
        let customer_id = self.resolve_customer(email, extraction).await?;
        let evidence_json = serde_json::to_string(&extraction.evidence)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let record_ref = match &extraction.record {
            ExtractedRecord::Quote(f) => {
                let id = self
                    .inserter
                    .insert_quote(&NewQuote {
                        customer_id,
                        request: f.request.clone(),
                        items: f.items.clone(),
                        budget: f.budget,
                        evidence_json,
                        pending_review,
                        log_entry_id,
                    })
                    .await?;
                RecordRef {
                    record_type: RecordType::Quote,
                    id,
                }
            }
            ExtractedRecord::Order(f) => {
                let id = self
                    .inserter
                    .insert_order(&NewOrder {
                        customer_id,
                        items: f.items.clone(),
                        quantity: f.quantity,
                        needed_by: f.needed_by.clone(),
                        note: f.note.clone(),
                        evidence_json,
                        pending_review,
                        log_entry_id,
                    })
                    .await?;
                RecordRef {
                    record_type: RecordType::Order,
                    id,
                }
            }
            ExtractedRecord::Repair(f) => {
                let id = self
                    .inserter
                    .insert_repair(&NewRepair {
                        customer_id,
                        item: f.item.clone(),
                        issue: f.issue.clone(),
                        urgency: f.urgency,
                        evidence_json,
                        pending_review,
                        log_entry_id,
                    })
                    .await?;
                RecordRef {
                    record_type: RecordType::Repair,
                    id,
                }
            }
            ExtractedRecord::TradeIn(f) => {
                let id = self
                    .inserter
                    .insert_trade_in(&NewTradeIn {
                        customer_id,
                        item: f.item.clone(),
                        metal: f.metal.clone(),
                        asking_value: f.asking_value,
                        evidence_json,
                        pending_review,
                        log_entry_id,
                    })
                    .await?;
                RecordRef {
                    record_type: RecordType::TradeIn,
                    id,
                }
            }
            ExtractedRecord::Communication(f) => {
                let id = self
                    .inserter
                    .insert_communication_note(&NewCommunicationNote {
                        customer_id,
                        topic: f.topic.clone(),
                        summary: f.summary.clone(),
                        evidence_json,
                        pending_review,
                        log_entry_id,
                    })
                    .await?;
                RecordRef {
                    record_type: RecordType::CommunicationNote,
                    id,
                }
            }
        };

        debug!(
            record_type = record_ref.record_type.as_str(),
            record_id = %record_ref.id,
            pending_review,
            "record created"
        );
        Ok(record_ref)
    }

    /// Attach the record to a customer: exact email match wins, anything
    /// else inserts a fresh customer row.
    async fn resolve_customer(
        &self,
        email: &InboundEmail,
        extraction: &ExtractionOutcome,
    ) -> Result<Uuid, DatabaseError> {
        if let Some(id) = self.inserter.find_customer(&email.from).await? {
            return Ok(id);
        }

        let name = match &extraction.record {
            ExtractedRecord::Quote(f) => f.customer_name.clone(),
            _ => None,
        }
        .unwrap_or_else(|| display_name_from_address(&email.from));

        self.inserter
            .insert_customer(&NewCustomer {
                name,
                email: email.from.clone(),
            })
            .await
    }
}

/// "jane.doe@example.com" → "Jane Doe".
fn display_name_from_address(address: &str) -> String {
    let local = address.split('@').next().unwrap_or(address);
    local
        .split(['.', '_', '-', '+'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
