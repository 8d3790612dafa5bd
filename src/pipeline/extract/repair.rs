//! Repair extraction — item description, issue, urgency.

use regex::Regex;

use super::{
    EvidenceMap, ExtractedRecord, ExtractionOutcome, FieldExtractor, RepairFields, Urgency,
    find_items, item_regex, line_around,
};
use crate::pipeline::types::DomainLabel;

const REQUIRED: &[&str] = &["item", "issue"];

/// Extracts repair requests. The item being repaired is mandatory; urgency
/// defaults to normal unless rush language appears.
pub struct RepairExtractor {
    items: Regex,
    issue: Regex,
    rush: Regex,
}

impl RepairExtractor {
    pub fn new() -> Self {
        Self {
            items: item_regex(),
            issue: Regex::new(
                r"(?i)\b(broken|snapped|cracked|bent|loose|missing (?:a )?stone|lost (?:a )?stone|clasp (?:is )?broken|won'?t (?:close|clasp)|stopped working|scratched|tarnished|needs? resizing|resiz(?:e|ing)|doesn'?t fit)\b",
            )
            .unwrap(),
            rush: Regex::new(r"(?i)\b(asap|urgent(?:ly)?|as soon as possible|right away|rush)\b")
                .unwrap(),
        }
    }
}

impl Default for RepairExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for RepairExtractor {
    fn label(&self) -> DomainLabel {
        DomainLabel::Repair
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn extract(&self, body: &str, attachments: &[String]) -> ExtractionOutcome {
        let mut fields = RepairFields::default();
        let mut evidence = EvidenceMap::new();

        let items = find_items(&self.items, body);
        if let Some(item) = items.first() {
            fields.item = Some(item.clone());
            evidence.insert("item".into(), item.clone());
        }

        if let Some(m) = self.issue.find(body) {
            // Keep the whole line — "the clasp is broken" reads better than
            // the bare matched word.
            let context = line_around(body, m.start());
            fields.issue = Some(context.clone());
            evidence.insert("issue".into(), context);
        }

        if let Some(m) = self.rush.find(body) {
            fields.urgency = Urgency::Rush;
            evidence.insert("urgency".into(), m.as_str().to_string());
        }

        // Photo attachments are evidence for the item even when the text
        // doesn't name it well.
        if fields.item.is_none() {
            if let Some(photo) = attachments.iter().find(|a| {
                let a = a.to_lowercase();
                a.ends_with(".jpg") || a.ends_with(".jpeg") || a.ends_with(".png")
            }) {
                evidence.insert("attachment_photo".into(), photo.clone());
            }
        }

        ExtractionOutcome::new(ExtractedRecord::Repair(fields), REQUIRED, evidence, vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(body: &str) -> ExtractionOutcome {
        RepairExtractor::new().extract(body, &[])
    }

    #[test]
    fn captures_item_and_issue() {
        let outcome = extract("My gold bracelet snapped at the clasp, can you repair it?");
        let ExtractedRecord::Repair(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.item.as_deref(), Some("gold bracelet"));
        assert!(f.issue.as_deref().unwrap().contains("snapped"));
        assert_eq!(f.urgency, Urgency::Normal);
        assert!(outcome.gaps().is_empty());
    }

    #[test]
    fn rush_language_sets_urgency() {
        let outcome = extract("Ring is cracked — need it fixed ASAP for the wedding.");
        let ExtractedRecord::Repair(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.urgency, Urgency::Rush);
        assert!(outcome.evidence.contains_key("urgency"));
    }

    #[test]
    fn missing_issue_is_a_gap() {
        let outcome = extract("Bringing in my pearl necklace next week.");
        assert_eq!(outcome.gaps(), vec!["issue"]);
    }

    #[test]
    fn photo_attachment_recorded_when_item_unclear() {
        let outcome = RepairExtractor::new().extract(
            "It's broken, see the photo.",
            &["IMG_2041.jpg".to_string()],
        );
        assert_eq!(outcome.evidence.get("attachment_photo").map(String::as_str), Some("IMG_2041.jpg"));
        assert!(outcome.gaps().contains(&"item"));
    }
}
