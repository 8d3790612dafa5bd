//! Order extraction — items, quantity, requested date.

use regex::Regex;

use super::{
    EvidenceMap, ExtractedRecord, ExtractionOutcome, FieldExtractor, OrderFields, find_items,
    item_regex, summarize,
};
use crate::pipeline::types::DomainLabel;

const REQUIRED: &[&str] = &["items"];

/// Extracts purchase orders. An order needs at least one identifiable item;
/// quantity and deadline are nice-to-have.
pub struct OrderExtractor {
    items: Regex,
    quantity: Regex,
    needed_by: Regex,
}

impl OrderExtractor {
    pub fn new() -> Self {
        Self {
            items: item_regex(),
            quantity: Regex::new(r"(?i)\b([0-9]{1,3})\s*(?:x\b|pieces?\b|pcs\b|units?\b|of\b)")
                .unwrap(),
            needed_by: Regex::new(
                r"(?i)\b(?:by|before|needed (?:by|for)|deliver(?:ed)? by)\s+((?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+[0-9]{1,2}(?:st|nd|rd|th)?|[0-9]{1,2}/[0-9]{1,2}(?:/[0-9]{2,4})?)",
            )
            .unwrap(),
        }
    }
}

impl Default for OrderExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for OrderExtractor {
    fn label(&self) -> DomainLabel {
        DomainLabel::Order
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn extract(&self, body: &str, _attachments: &[String]) -> ExtractionOutcome {
        let mut fields = OrderFields {
            note: summarize(body, 200),
            ..Default::default()
        };
        let mut evidence = EvidenceMap::new();

        let items = find_items(&self.items, body);
        if !items.is_empty() {
            evidence.insert("items".into(), items.join("; "));
            fields.items = items;
        }

        if let Some(cap) = self.quantity.captures(body) {
            if let Ok(q) = cap[1].parse::<u32>() {
                fields.quantity = Some(q);
                evidence.insert("quantity".into(), cap[0].trim().to_string());
            }
        }

        if let Some(cap) = self.needed_by.captures(body) {
            fields.needed_by = Some(cap[1].to_string());
            evidence.insert("needed_by".into(), cap[0].to_string());
        }

        ExtractionOutcome::new(ExtractedRecord::Order(fields), REQUIRED, evidence, vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(body: &str) -> ExtractionOutcome {
        OrderExtractor::new().extract(body, &[])
    }

    #[test]
    fn captures_items_quantity_and_deadline() {
        let outcome =
            extract("I'd like to order 3 x silver bands, delivered by June 14th please.");
        let ExtractedRecord::Order(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.items, vec!["silver bands"]);
        assert_eq!(f.quantity, Some(3));
        assert_eq!(f.needed_by.as_deref(), Some("June 14th"));
        assert!(outcome.gaps().is_empty());
    }

    #[test]
    fn numeric_date_form() {
        let outcome = extract("Please ship the pearl necklace by 10/03/2026.");
        let ExtractedRecord::Order(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.needed_by.as_deref(), Some("10/03/2026"));
    }

    #[test]
    fn missing_items_is_a_gap() {
        let outcome = extract("I'd like to place an order, will call with details.");
        assert_eq!(outcome.gaps(), vec!["items"]);
        assert_eq!(outcome.coverage(), 0.0);
    }

    #[test]
    fn note_always_summarizes_body() {
        let outcome = extract("Order the usual.");
        let ExtractedRecord::Order(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.note, "Order the usual.");
    }
}
