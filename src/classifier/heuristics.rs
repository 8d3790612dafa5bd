//! Deterministic keyword heuristics for domain classification.
//!
//! Cheap first pass before any remote call: score each domain label by
//! keyword hits (subject hits count double), and answer only when the top
//! label is both strong and clearly ahead of the runner-up. Ambiguous
//! emails fall through to the remote classifier.

use regex::Regex;

use crate::pipeline::types::{ClassificationResult, DomainLabel};

/// Minimum winning score for a decisive answer.
const MIN_SCORE: u32 = 3;

/// Required lead over the second-best label.
const MIN_MARGIN: u32 = 2;

struct KeywordSet {
    label: DomainLabel,
    regex: Regex,
    weight: u32,
}

/// Keyword-based classifier over subject + body.
pub struct Heuristics {
    sets: Vec<KeywordSet>,
}

impl Heuristics {
    pub fn new() -> Self {
        let set = |label, pattern: &str, weight| KeywordSet {
            label,
            regex: Regex::new(&format!("(?i){pattern}")).unwrap(),
            weight,
        };

        let sets = vec![
            set(DomainLabel::Quote, r"\b(quote|quotation|estimate)\b", 3),
            set(DomainLabel::Quote, r"\b(budget|price range|how much would)\b", 1),
            set(DomainLabel::Order, r"\b(order|purchase|buy)\b", 2),
            set(DomainLabel::Order, r"\b(ship|delivery|invoice me)\b", 1),
            set(DomainLabel::Repair, r"\b(repair|fix|broken|resize|resizing)\b", 3),
            set(DomainLabel::Repair, r"\b(cracked|snapped|clasp|tarnished)\b", 1),
            set(DomainLabel::TradeIn, r"\b(trade[ -]?in|sell (?:my|you)|exchange|cash for)\b", 3),
            set(DomainLabel::TradeIn, r"\b(appraisal|what(?:'s| is) it worth)\b", 1),
            set(DomainLabel::Communication, r"\b(thank you|thanks|follow(?:ing)? up|feedback)\b", 1),
        ];

        Self { sets }
    }

    /// Score every keyword set against subject and body.
    fn scores(&self, subject: &str, body: &str) -> Vec<(DomainLabel, u32)> {
        let mut totals: Vec<(DomainLabel, u32)> = DomainLabel::known()
            .into_iter()
            .map(|l| (l, 0))
            .collect();

        for set in &self.sets {
            let mut score = 0;
            if set.regex.is_match(subject) {
                score += set.weight * 2;
            }
            if set.regex.is_match(body) {
                score += set.weight;
            }
            if score > 0 {
                if let Some(entry) = totals.iter_mut().find(|(l, _)| *l == set.label) {
                    entry.1 += score;
                }
            }
        }

        totals.sort_by(|a, b| b.1.cmp(&a.1));
        totals
    }

    /// Decisive classification, or `None` when the remote classifier should
    /// be consulted.
    pub fn classify(&self, subject: &str, body: &str) -> Option<ClassificationResult> {
        let scores = self.scores(subject, body);
        let (top_label, top) = scores[0];
        let (_, second) = scores[1];

        if top < MIN_SCORE || top - second < MIN_MARGIN {
            return None;
        }

        // Map the winning score onto a confidence band; capped so only the
        // remote classifier (or a fixed-scope integration) can reach 1.0.
        let confidence = (0.55 + 0.05 * top as f32).min(0.95);
        Some(ClassificationResult {
            label: top_label,
            confidence,
        })
    }
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(subject: &str, body: &str) -> Option<ClassificationResult> {
        Heuristics::new().classify(subject, body)
    }

    #[test]
    fn quote_request_is_decisive() {
        let result = classify("Quote Request", "14K gold ring, budget $2000").unwrap();
        assert_eq!(result.label, DomainLabel::Quote);
        assert!(result.confidence >= 0.6);
        assert!(result.confidence <= 0.95);
    }

    #[test]
    fn repair_language_is_decisive() {
        let result = classify("Broken clasp", "My bracelet clasp snapped, can you fix it?").unwrap();
        assert_eq!(result.label, DomainLabel::Repair);
    }

    #[test]
    fn trade_in_is_decisive() {
        let result = classify("Trade-in", "I want to trade in my old watch.").unwrap();
        assert_eq!(result.label, DomainLabel::TradeIn);
    }

    #[test]
    fn vague_email_is_not_decisive() {
        assert!(classify("Hello", "Hi, I was in your shop last week.").is_none());
    }

    #[test]
    fn mixed_signals_are_not_decisive() {
        // Quote and repair terms together — margin rule kicks in.
        let result = classify("Question", "Can you quote a repair? The estimate to fix it?");
        assert!(result.is_none() || result.unwrap().confidence < 0.9);
    }

    #[test]
    fn confidence_is_capped() {
        let result = classify(
            "Quote estimate quotation",
            "quote quotation estimate budget price range",
        )
        .unwrap();
        assert!(result.confidence <= 0.95);
    }
}
