//! Field extraction — one strategy per domain label.
//!
//! Every strategy implements [`FieldExtractor`]: pull structured fields out
//! of free text, record a raw-text evidence snippet per captured field, and
//! surface missing required fields as explicit gaps (never silently
//! defaulted). Extraction is deterministic regex work; the bounded remote
//! extractor may fill remaining gaps afterwards via
//! [`ExtractionOutcome::merge_remote`].

mod communication;
mod order;
mod quote;
mod repair;
mod trade_in;

use std::collections::BTreeMap;

pub use communication::CommunicationExtractor;
pub use order::OrderExtractor;
pub use quote::QuoteExtractor;
pub use repair::RepairExtractor;
pub use trade_in::TradeInExtractor;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::classifier::RemoteExtraction;
use crate::pipeline::types::DomainLabel;

/// Field name → raw-text snippet that produced it.
pub type EvidenceMap = BTreeMap<String, String>;

// ── Extracted record ────────────────────────────────────────────────

/// Repair urgency, inferred from rush language in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Rush,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteFields {
    pub customer_name: Option<String>,
    pub items: Vec<String>,
    pub budget: Option<Decimal>,
    /// Free-text summary of what was asked for.
    pub request: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFields {
    pub items: Vec<String>,
    pub quantity: Option<u32>,
    pub needed_by: Option<String>,
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairFields {
    pub item: Option<String>,
    pub issue: Option<String>,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeInFields {
    pub item: Option<String>,
    pub metal: Option<String>,
    pub asking_value: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunicationFields {
    pub topic: Option<String>,
    pub summary: String,
}

/// Discriminated union of extraction results, one variant per domain label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum ExtractedRecord {
    Quote(QuoteFields),
    Order(OrderFields),
    Repair(RepairFields),
    TradeIn(TradeInFields),
    Communication(CommunicationFields),
}

impl ExtractedRecord {
    pub fn label(&self) -> DomainLabel {
        match self {
            Self::Quote(_) => DomainLabel::Quote,
            Self::Order(_) => DomainLabel::Order,
            Self::Repair(_) => DomainLabel::Repair,
            Self::TradeIn(_) => DomainLabel::TradeIn,
            Self::Communication(_) => DomainLabel::Communication,
        }
    }

    /// Apply a remote-supplied field value. Returns false when the field
    /// name is unknown for this variant or the value does not parse.
    fn apply_field(&mut self, field: &str, value: &str) -> bool {
        match self {
            Self::Quote(f) => match field {
                "customer_name" => set_text(&mut f.customer_name, value),
                "items" => set_items(&mut f.items, value),
                "budget" => set_decimal(&mut f.budget, value),
                _ => false,
            },
            Self::Order(f) => match field {
                "items" => set_items(&mut f.items, value),
                "quantity" => match value.trim().parse() {
                    Ok(q) => {
                        f.quantity = Some(q);
                        true
                    }
                    Err(_) => false,
                },
                "needed_by" => set_text(&mut f.needed_by, value),
                _ => false,
            },
            Self::Repair(f) => match field {
                "item" => set_text(&mut f.item, value),
                "issue" => set_text(&mut f.issue, value),
                _ => false,
            },
            Self::TradeIn(f) => match field {
                "item" => set_text(&mut f.item, value),
                "metal" => set_text(&mut f.metal, value),
                "asking_value" => set_decimal(&mut f.asking_value, value),
                _ => false,
            },
            Self::Communication(f) => match field {
                "topic" => set_text(&mut f.topic, value),
                _ => false,
            },
        }
    }
}

fn set_text(slot: &mut Option<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    *slot = Some(value.to_string());
    true
}

fn set_items(items: &mut Vec<String>, value: &str) -> bool {
    let parsed: Vec<String> = value
        .split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if parsed.is_empty() {
        return false;
    }
    *items = parsed;
    true
}

fn set_decimal(slot: &mut Option<Decimal>, value: &str) -> bool {
    match parse_money(value) {
        Some(d) => {
            *slot = Some(d);
            true
        }
        None => false,
    }
}

// ── Extraction outcome ──────────────────────────────────────────────

/// Result of running one extractor over a body.
///
/// A required field is a gap exactly when it has no evidence entry, so
/// filling a field (locally or remotely) can only raise coverage.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub record: ExtractedRecord,
    pub evidence: EvidenceMap,
    /// Conflicting-interpretation notes; each one dents the confidence score.
    pub ambiguities: Vec<String>,
    required: &'static [&'static str],
}

impl ExtractionOutcome {
    pub fn new(
        record: ExtractedRecord,
        required: &'static [&'static str],
        evidence: EvidenceMap,
        ambiguities: Vec<String>,
    ) -> Self {
        Self {
            record,
            evidence,
            ambiguities,
            required,
        }
    }

    /// Required fields with no evidence.
    pub fn gaps(&self) -> Vec<&'static str> {
        self.required
            .iter()
            .filter(|f| !self.evidence.contains_key(**f))
            .copied()
            .collect()
    }

    /// Fraction of required fields captured, in [0,1]. 1.0 when the domain
    /// has no required fields.
    pub fn coverage(&self) -> f32 {
        if self.required.is_empty() {
            return 1.0;
        }
        let missing = self.gaps().len();
        (self.required.len() - missing) as f32 / self.required.len() as f32
    }

    /// Fill remaining gaps from a remote extraction. Only gaps are touched —
    /// locally captured fields always win. Remote evidence is tagged so the
    /// audit trail shows which fields the model supplied.
    pub fn merge_remote(&mut self, remote: &RemoteExtraction) {
        for field in self.gaps() {
            let Some(value) = remote.fields.get(field) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            if self.record.apply_field(field, value) {
                let snippet = remote
                    .evidence
                    .get(field)
                    .cloned()
                    .unwrap_or_else(|| value.clone());
                self.evidence
                    .insert(field.to_string(), format!("(model) {snippet}"));
            }
        }
    }
}

// ── Extractor trait ─────────────────────────────────────────────────

/// One extraction strategy per domain label.
pub trait FieldExtractor: Send + Sync {
    fn label(&self) -> DomainLabel;
    /// Fields this domain requires; missing ones are reported as gaps.
    fn required_fields(&self) -> &'static [&'static str];
    fn extract(&self, body: &str, attachments: &[String]) -> ExtractionOutcome;
}

/// All extractors, regexes compiled once at startup. Adding a domain type
/// means adding one implementation and wiring it here.
pub struct ExtractorSet {
    quote: QuoteExtractor,
    order: OrderExtractor,
    repair: RepairExtractor,
    trade_in: TradeInExtractor,
    communication: CommunicationExtractor,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self {
            quote: QuoteExtractor::new(),
            order: OrderExtractor::new(),
            repair: RepairExtractor::new(),
            trade_in: TradeInExtractor::new(),
            communication: CommunicationExtractor::new(),
        }
    }

    /// Strategy for a label. `Unknown` has no extractor — those deliveries
    /// queue for human confirmation instead.
    pub fn for_label(&self, label: DomainLabel) -> Option<&dyn FieldExtractor> {
        match label {
            DomainLabel::Quote => Some(&self.quote),
            DomainLabel::Order => Some(&self.order),
            DomainLabel::Repair => Some(&self.repair),
            DomainLabel::TradeIn => Some(&self.trade_in),
            DomainLabel::Communication => Some(&self.communication),
            DomainLabel::Unknown => None,
        }
    }
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared text helpers ─────────────────────────────────────────────

/// Regex for jewelry item phrases ("14K gold ring", "pearl necklace", ...).
pub(crate) fn item_regex() -> Regex {
    Regex::new(
        r"(?i)\b((?:\d{1,2}\s*kt?\s+)?(?:yellow\s+|white\s+|rose\s+)?(?:gold|silver|platinum|titanium|diamond|pearl|sapphire|emerald|ruby)?\s*(?:engagement\s+|wedding\s+)?(?:rings?|necklaces?|bracelets?|earrings?|pendants?|chains?|watch(?:es)?|brooch(?:es)?|bangles?|bands?|cufflinks?))\b",
    )
    .unwrap()
}

/// Capture jewelry item phrases from a body, deduplicated, capped.
pub(crate) fn find_items(regex: &Regex, text: &str) -> Vec<String> {
    let mut items = Vec::new();
    for cap in regex.captures_iter(text).take(20) {
        let item = cap[1].trim().to_string();
        if !items.iter().any(|i: &String| i.eq_ignore_ascii_case(&item)) {
            items.push(item);
        }
        if items.len() >= 10 {
            break;
        }
    }
    items
}

/// Regex for dollar amounts.
pub(crate) fn money_regex() -> Regex {
    Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)").unwrap()
}

/// All distinct dollar amounts in a body, with their snippets.
pub(crate) fn find_amounts(regex: &Regex, text: &str) -> Vec<(Decimal, String)> {
    let mut out: Vec<(Decimal, String)> = Vec::new();
    for cap in regex.captures_iter(text).take(10) {
        if let Some(amount) = parse_money(&cap[1]) {
            if !out.iter().any(|(a, _)| *a == amount) {
                out.push((amount, cap[0].trim().to_string()));
            }
        }
    }
    out
}

/// Parse "2,000.50" / "$2000" style text into a Decimal.
pub(crate) fn parse_money(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// First ~200 chars of a body with whitespace collapsed, for summaries.
pub(crate) fn summarize(body: &str, max: usize) -> String {
    let collapsed: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() <= max {
        return collapsed;
    }
    let mut end = max;
    while !collapsed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &collapsed[..end])
}

/// The line containing a match position, trimmed for evidence display.
pub(crate) fn line_around(text: &str, pos: usize) -> String {
    let start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let end = text[pos..].find('\n').map_or(text.len(), |i| pos + i);
    summarize(&text[start..end], 120)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn item_regex_captures_full_phrase() {
        let re = item_regex();
        let items = find_items(&re, "I'd like a 14K gold ring and a pearl necklace.");
        assert_eq!(items, vec!["14K gold ring", "pearl necklace"]);
    }

    #[test]
    fn items_deduplicate_case_insensitively() {
        let re = item_regex();
        let items = find_items(&re, "A silver chain. Another SILVER CHAIN please.");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn money_parses_commas_and_cents() {
        assert_eq!(parse_money("2,000.50"), Some(dec!(2000.50)));
        assert_eq!(parse_money("$2000"), Some(dec!(2000)));
        assert_eq!(parse_money("n/a"), None);
    }

    #[test]
    fn find_amounts_dedupes() {
        let re = money_regex();
        let amounts = find_amounts(&re, "between $500 and $800, yes $500");
        assert_eq!(amounts.len(), 2);
    }

    #[test]
    fn coverage_counts_gaps() {
        let mut evidence = EvidenceMap::new();
        evidence.insert("item".into(), "gold ring".into());
        let outcome = ExtractionOutcome::new(
            ExtractedRecord::Repair(RepairFields::default()),
            &["item", "issue"],
            evidence,
            vec![],
        );
        assert_eq!(outcome.gaps(), vec!["issue"]);
        assert!((outcome.coverage() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn coverage_is_full_with_no_required_fields() {
        let outcome = ExtractionOutcome::new(
            ExtractedRecord::Communication(CommunicationFields::default()),
            &[],
            EvidenceMap::new(),
            vec![],
        );
        assert_eq!(outcome.coverage(), 1.0);
    }

    #[test]
    fn merge_remote_fills_only_gaps() {
        let mut evidence = EvidenceMap::new();
        evidence.insert("item".into(), "gold ring".into());
        let mut outcome = ExtractionOutcome::new(
            ExtractedRecord::Repair(RepairFields {
                item: Some("gold ring".into()),
                ..Default::default()
            }),
            &["item", "issue"],
            evidence,
            vec![],
        );

        let mut remote = RemoteExtraction::default();
        remote.fields.insert("issue".into(), "clasp broken".into());
        remote.fields.insert("item".into(), "should not win".into());
        outcome.merge_remote(&remote);

        let ExtractedRecord::Repair(fields) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(fields.item.as_deref(), Some("gold ring"));
        assert_eq!(fields.issue.as_deref(), Some("clasp broken"));
        assert!(outcome.gaps().is_empty());
        assert!(outcome.evidence["issue"].starts_with("(model)"));
    }

    #[test]
    fn merge_remote_ignores_unparseable_values() {
        let mut outcome = ExtractionOutcome::new(
            ExtractedRecord::Quote(QuoteFields::default()),
            &["items", "budget"],
            EvidenceMap::new(),
            vec![],
        );
        let mut remote = RemoteExtraction::default();
        remote.fields.insert("budget".into(), "no idea".into());
        outcome.merge_remote(&remote);
        assert_eq!(outcome.gaps().len(), 2);
    }

    #[test]
    fn extractor_set_covers_all_known_labels() {
        let set = ExtractorSet::new();
        for label in DomainLabel::known() {
            assert!(set.for_label(label).is_some(), "missing {label:?}");
        }
        assert!(set.for_label(DomainLabel::Unknown).is_none());
    }
}
