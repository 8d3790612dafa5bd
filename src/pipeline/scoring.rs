//! Confidence scoring — one [0,1] number per extraction.
//!
//! Weighted blend of classifier confidence and required-field coverage,
//! minus a small penalty per conflicting-interpretation note. Coverage is
//! monotonic by construction: filling a previously-missing required field
//! can only raise or hold the score.

use crate::pipeline::extract::ExtractionOutcome;
use crate::pipeline::types::ClassificationResult;

const CLASSIFIER_WEIGHT: f32 = 0.5;
const COVERAGE_WEIGHT: f32 = 0.5;

/// Deducted per ambiguity note.
const AMBIGUITY_PENALTY: f32 = 0.05;

/// Cap on the total ambiguity deduction.
const AMBIGUITY_PENALTY_MAX: f32 = 0.15;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        classification: &ClassificationResult,
        extraction: &ExtractionOutcome,
    ) -> f32 {
        let classifier = classification.confidence.clamp(0.0, 1.0);
        let coverage = extraction.coverage();
        let penalty = (extraction.ambiguities.len() as f32 * AMBIGUITY_PENALTY)
            .min(AMBIGUITY_PENALTY_MAX);

        (CLASSIFIER_WEIGHT * classifier + COVERAGE_WEIGHT * coverage - penalty).clamp(0.0, 1.0)
    }
}
