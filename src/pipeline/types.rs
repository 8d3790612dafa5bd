//! Shared types for the email processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound email ───────────────────────────────────────────────────

/// One webhook delivery, as handed to the pipeline.
///
/// Ephemeral value object — not persisted verbatim beyond what the
/// processing-log entry retains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEmail {
    /// Provider-assigned message id. The idempotency key.
    pub message_id: String,
    /// Recipient address — resolves the integration.
    pub to: String,
    /// Sender address.
    pub from: String,
    pub subject: String,
    pub body: String,
    /// Attachment file names. Referenced, never fetched.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// When the provider handed us the message. Providers that omit it
    /// get the time of delivery.
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

// ── Domain label ────────────────────────────────────────────────────

/// The business category an email is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainLabel {
    Quote,
    Order,
    Repair,
    TradeIn,
    Communication,
    Unknown,
}

impl DomainLabel {
    /// DB / display string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Order => "order",
            Self::Repair => "repair",
            Self::TradeIn => "trade_in",
            Self::Communication => "communication",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "quote" => Self::Quote,
            "order" => Self::Order,
            "repair" => Self::Repair,
            "trade_in" | "trade-in" | "tradein" => Self::TradeIn,
            "communication" => Self::Communication,
            _ => Self::Unknown,
        }
    }

    /// All labels an auto-detect integration may resolve to.
    pub fn known() -> [Self; 5] {
        [
            Self::Quote,
            Self::Order,
            Self::Repair,
            Self::TradeIn,
            Self::Communication,
        ]
    }
}

/// What an integration address accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "label")]
pub enum DomainScope {
    /// Address is dedicated to one domain; classification is trivial.
    Fixed(DomainLabel),
    /// Address accepts anything; the classifier decides.
    AutoDetect,
}

impl DomainScope {
    /// DB string: the label for fixed scopes, "auto" otherwise.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Fixed(label) => label.as_str(),
            Self::AutoDetect => "auto",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "auto" => Self::AutoDetect,
            other => Self::Fixed(DomainLabel::parse(other)),
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// A domain label plus the classifier's confidence in it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: DomainLabel,
    /// In [0,1]. 1.0 for fixed-scope integrations, 0.0 for `Unknown`.
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn unknown() -> Self {
        Self {
            label: DomainLabel::Unknown,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_webhook_payload_deserializes() {
        let email: InboundEmail = serde_json::from_value(serde_json::json!({
            "message_id": "msg-1",
            "to": "intake@example.com",
            "from": "jane@example.com",
            "subject": "hello",
            "body": "a quote please",
        }))
        .unwrap();
        assert!(email.attachments.is_empty());
        assert!(email.received_at <= Utc::now());
    }

    #[test]
    fn domain_label_round_trips() {
        for label in DomainLabel::known() {
            assert_eq!(DomainLabel::parse(label.as_str()), label);
        }
        assert_eq!(DomainLabel::parse("nonsense"), DomainLabel::Unknown);
    }

    #[test]
    fn trade_in_accepts_spelling_variants() {
        assert_eq!(DomainLabel::parse("trade-in"), DomainLabel::TradeIn);
        assert_eq!(DomainLabel::parse("tradein"), DomainLabel::TradeIn);
    }

    #[test]
    fn scope_db_round_trips() {
        assert_eq!(DomainScope::parse("auto"), DomainScope::AutoDetect);
        assert_eq!(
            DomainScope::parse("repair"),
            DomainScope::Fixed(DomainLabel::Repair)
        );
        assert_eq!(DomainScope::AutoDetect.as_db_str(), "auto");
        assert_eq!(
            DomainScope::Fixed(DomainLabel::Quote).as_db_str(),
            "quote"
        );
    }

    #[test]
    fn unknown_classification_has_zero_confidence() {
        let c = ClassificationResult::unknown();
        assert_eq!(c.label, DomainLabel::Unknown);
        assert_eq!(c.confidence, 0.0);
    }
}
