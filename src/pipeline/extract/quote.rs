//! Quote extraction — line items, budget, customer name.

use regex::Regex;

use super::{
    EvidenceMap, ExtractedRecord, ExtractionOutcome, FieldExtractor, QuoteFields, find_amounts,
    find_items, item_regex, line_around, money_regex, summarize,
};
use crate::pipeline::types::DomainLabel;

const REQUIRED: &[&str] = &["items", "budget"];

/// Extracts quote requests. Requires at least one line item; the request
/// summary is always captured so a human can resolve queued gaps.
pub struct QuoteExtractor {
    items: Regex,
    money: Regex,
    budget_context: Regex,
    name: Regex,
    repair_terms: Regex,
}

impl QuoteExtractor {
    pub fn new() -> Self {
        Self {
            items: item_regex(),
            money: money_regex(),
            budget_context: Regex::new(
                r"(?i)\b(?:budget|spend|around|up to|max(?:imum)?|under|no more than)\b[^0-9$\n]{0,20}\$?\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)",
            )
            .unwrap(),
            name: Regex::new(
                r"(?:[Mm]y name is|[Tt]his is)\s+([A-Z][a-zA-Z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+)?)",
            )
            .unwrap(),
            repair_terms: Regex::new(r"(?i)\b(repair|fix|broken|cracked|resize)\b").unwrap(),
        }
    }
}

impl Default for QuoteExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for QuoteExtractor {
    fn label(&self) -> DomainLabel {
        DomainLabel::Quote
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn extract(&self, body: &str, _attachments: &[String]) -> ExtractionOutcome {
        let mut fields = QuoteFields {
            request: summarize(body, 200),
            ..Default::default()
        };
        let mut evidence = EvidenceMap::new();
        let mut ambiguities = Vec::new();

        let items = find_items(&self.items, body);
        if !items.is_empty() {
            evidence.insert("items".into(), items.join("; "));
            fields.items = items;
        }

        // Prefer an amount with budget context; fall back to the only
        // dollar amount in the body.
        if let Some(cap) = self.budget_context.captures(body) {
            if let Some(budget) = super::parse_money(&cap[1]) {
                fields.budget = Some(budget);
                evidence.insert("budget".into(), cap[0].trim().to_string());
            }
        } else {
            let amounts = find_amounts(&self.money, body);
            match amounts.as_slice() {
                [(amount, snippet)] => {
                    fields.budget = Some(*amount);
                    evidence.insert("budget".into(), snippet.clone());
                }
                [_, _, ..] => {
                    ambiguities.push(format!(
                        "{} distinct amounts, none marked as budget",
                        amounts.len()
                    ));
                }
                [] => {}
            }
        }

        if let Some(cap) = self.name.captures(body) {
            fields.customer_name = Some(cap[1].to_string());
            evidence.insert("customer_name".into(), cap[0].to_string());
        }

        if self.repair_terms.is_match(body) {
            if let Some(m) = self.repair_terms.find(body) {
                ambiguities.push(format!(
                    "repair language in a quote request: \"{}\"",
                    line_around(body, m.start())
                ));
            }
        }

        ExtractionOutcome::new(ExtractedRecord::Quote(fields), REQUIRED, evidence, ambiguities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn extract(body: &str) -> ExtractionOutcome {
        QuoteExtractor::new().extract(body, &[])
    }

    #[test]
    fn captures_item_and_budget() {
        let outcome = extract("Hi, I'd like a quote for a 14K gold ring, budget $2000.");
        let ExtractedRecord::Quote(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.items, vec!["14K gold ring"]);
        assert_eq!(f.budget, Some(dec!(2000)));
        assert!(outcome.gaps().is_empty());
        assert_eq!(outcome.coverage(), 1.0);
    }

    #[test]
    fn captures_customer_name() {
        let outcome = extract("Hello, my name is Grace Hopper. Looking for a silver bracelet, around $300.");
        let ExtractedRecord::Quote(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.customer_name.as_deref(), Some("Grace Hopper"));
        assert!(outcome.evidence.contains_key("customer_name"));
    }

    #[test]
    fn missing_budget_is_a_gap_not_a_default() {
        let outcome = extract("Could you quote me for a pair of diamond earrings?");
        let ExtractedRecord::Quote(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert!(f.budget.is_none());
        assert_eq!(outcome.gaps(), vec!["budget"]);
    }

    #[test]
    fn no_items_leaves_request_summary() {
        let outcome = extract("I want something nice for my wife's birthday, surprise me.");
        let ExtractedRecord::Quote(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert!(f.items.is_empty());
        assert!(f.request.contains("something nice"));
        assert!(outcome.gaps().contains(&"items"));
    }

    #[test]
    fn multiple_amounts_without_context_is_ambiguous() {
        let outcome = extract("A gold band. I saw one for $800 but also one for $1200.");
        let ExtractedRecord::Quote(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert!(f.budget.is_none());
        assert!(!outcome.ambiguities.is_empty());
    }

    #[test]
    fn budget_context_wins_over_other_amounts() {
        let outcome = extract("The one I saw was $3500, but my budget is $2000. Gold necklace.");
        let ExtractedRecord::Quote(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.budget, Some(dec!(2000)));
    }

    #[test]
    fn repair_language_flags_ambiguity() {
        let outcome = extract("Quote to fix my broken gold ring? Budget $100.");
        assert!(outcome
            .ambiguities
            .iter()
            .any(|a| a.contains("repair language")));
    }
}
