//! General communication extraction — topic and summary only.
//!
//! The catch-all domain. Nothing is required: any email can become a
//! communication note, so coverage is always full and routing falls back
//! to the integration's flags and the classifier's confidence.

use super::{
    CommunicationFields, EvidenceMap, ExtractedRecord, ExtractionOutcome, FieldExtractor,
    summarize,
};
use crate::pipeline::types::DomainLabel;

const REQUIRED: &[&str] = &[];

pub struct CommunicationExtractor;

impl CommunicationExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CommunicationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CommunicationExtractor {
    fn label(&self) -> DomainLabel {
        DomainLabel::Communication
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn extract(&self, body: &str, _attachments: &[String]) -> ExtractionOutcome {
        let topic = body
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| summarize(l, 80));

        let summary = summarize(body, 200);

        let mut evidence = EvidenceMap::new();
        if let Some(ref t) = topic {
            evidence.insert("topic".into(), t.clone());
        }
        evidence.insert("summary".into(), summary.clone());

        ExtractionOutcome::new(
            ExtractedRecord::Communication(CommunicationFields { topic, summary }),
            REQUIRED,
            evidence,
            vec![],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_and_topic_from_body() {
        let outcome = CommunicationExtractor::new().extract(
            "Just wanted to say thanks!\n\nThe ring arrived and it's beautiful.",
            &[],
        );
        let ExtractedRecord::Communication(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert_eq!(f.topic.as_deref(), Some("Just wanted to say thanks!"));
        assert!(f.summary.contains("beautiful"));
        assert!(outcome.gaps().is_empty());
        assert_eq!(outcome.coverage(), 1.0);
    }

    #[test]
    fn empty_body_still_extracts() {
        let outcome = CommunicationExtractor::new().extract("", &[]);
        let ExtractedRecord::Communication(f) = &outcome.record else {
            panic!("wrong variant");
        };
        assert!(f.topic.is_none());
        assert_eq!(outcome.coverage(), 1.0);
    }
}
