//! Trade-in extraction — item, metal, asking value.

use regex::Regex;

use super::{
    EvidenceMap, ExtractedRecord, ExtractionOutcome, FieldExtractor, TradeInFields, find_amounts,
    find_items, item_regex, money_regex,
};
use crate::pipeline::types::DomainLabel;

const REQUIRED: &[&str] = &["item"];

/// Extracts trade-in offers — customers selling or exchanging pieces.
pub struct TradeInExtractor {
    items: Regex,
    money: Regex,
    metal: Regex,
}

impl TradeInExtractor {
    pub fn new() -> Self {
        Self {
            items: item_regex(),
            money: money_regex(),
            metal: Regex::new(
                r"(?i)\b((?:\d{1,2}\s*kt?\s+)?(?:yellow\s+|white\s+|rose\s+)?(?:gold|silver|platinum|palladium))\b",
            )
            .unwrap(),
        }
    }
}

impl Default for TradeInExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TradeInExtractor {
    fn label(&self) -> DomainLabel {
        DomainLabel::TradeIn
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn extract(&self, body: &str, _attachments: &[String]) -> ExtractionOutcome {
        let mut fields = TradeInFields::default();
        let mut evidence = EvidenceMap::new();
        let mut ambiguities = Vec::new();

        let items = find_items(&self.items, body);
        if let Some(item) = items.first() {
            fields.item = Some(item.clone());
            evidence.insert("item".into(), item.clone());
        }

        if let Some(cap) = self.metal.captures(body) {
            fields.metal = Some(cap[1].trim().to_string());
            evidence.insert("metal".into(), cap[0].trim().to_string());
        }

        let amounts = find_amounts(&self.money, body);
        match amounts.as_slice() {
            [(amount, snippet)] => {
                fields.asking_value = Some(*amount);
                evidence.insert("asking_value".into(), snippet.clone());
            }
            [_, _, ..] => {
                ambiguities.push(format!(
                    "{} distinct amounts, asking price unclear",
                    amounts.len()
                ));
            }
            [] => {}
        }

        ExtractionOutcome::new(
            ExtractedRecord::TradeIn(fields),
            REQUIRED,
            evidence,
            ambiguities,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn extract(body: &str) -> ExtractionOutcome {
        TradeInExtractor::new().extract(body, &[])
    }

    #[test]
    fn captures_item_metal_and_value() {
        let outcome = extract("I'd like to trade in my 18K gold necklace, hoping for $900.");
        let ExtractedRecord::TradeIn(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.item.as_deref(), Some("18K gold necklace"));
        assert_eq!(f.metal.as_deref(), Some("18K gold"));
        assert_eq!(f.asking_value, Some(dec!(900)));
        assert!(outcome.gaps().is_empty());
    }

    #[test]
    fn missing_item_is_a_gap() {
        let outcome = extract("Do you take trade-ins? I have some old pieces.");
        assert_eq!(outcome.gaps(), vec!["item"]);
    }

    #[test]
    fn multiple_amounts_flagged_ambiguous() {
        let outcome = extract("Selling a platinum band — paid $2000, would take $1200.");
        let ExtractedRecord::TradeIn(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert!(f.asking_value.is_none());
        assert!(!outcome.ambiguities.is_empty());
    }
}
