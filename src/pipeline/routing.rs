//! Routing policy — auto-create, queue for confirmation, or blocked.
//!
//! Three terminal routes per delivery. Blocked is decided by the security
//! stage and normally never reaches this policy; it is re-checked here so
//! a caller can't route a hostile email by mistake. Thresholds and flags
//! come from the integration snapshot, never from constants, so operators
//! tune strictness per address.

use crate::pipeline::types::{ClassificationResult, DomainLabel};
use crate::security::{RiskLevel, SecurityVerdict};
use crate::store::traits::EmailIntegration;

/// Terminal route for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Create the business record directly.
    AutoCreate,
    /// Insert a pending-review stub and wait for a human.
    QueueForConfirmation { reason: String },
    /// Security gate tripped — no record at all.
    Blocked,
}

impl Route {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AutoCreate => "auto_create",
            Self::QueueForConfirmation { .. } => "queue_for_confirmation",
            Self::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingPolicy;

impl RoutingPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn route(
        &self,
        integration: &EmailIntegration,
        verdict: &SecurityVerdict,
        classification: &ClassificationResult,
        score: f32,
    ) -> Route {
        if verdict.blocks() {
            return Route::Blocked;
        }

        // Auto-create is reserved for None/Low verdicts. A Medium verdict
        // doesn't block, but a human looks at it before a record exists.
        if verdict.level > RiskLevel::Low {
            return Route::QueueForConfirmation {
                reason: format!("security verdict {} needs review", verdict.level.as_str()),
            };
        }

        if classification.label == DomainLabel::Unknown {
            return Route::QueueForConfirmation {
                reason: "could not determine a domain label".into(),
            };
        }

        if !integration.auto_process {
            return Route::QueueForConfirmation {
                reason: "integration has auto-processing disabled".into(),
            };
        }

        if integration.require_confirmation {
            return Route::QueueForConfirmation {
                reason: "integration requires confirmation for every email".into(),
            };
        }

        if score < integration.confidence_threshold {
            return Route::QueueForConfirmation {
                reason: format!(
                    "confidence {score:.2} below threshold {:.2}",
                    integration.confidence_threshold
                ),
            };
        }

        Route::AutoCreate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::DomainScope;
    use crate::security::{RiskLevel, SecurityVerdict};

    fn integration(auto_process: bool, require_confirmation: bool, threshold: f32) -> EmailIntegration {
        let mut i = EmailIntegration::new("intake@example.com", DomainScope::AutoDetect);
        i.auto_process = auto_process;
        i.require_confirmation = require_confirmation;
        i.confidence_threshold = threshold;
        i
    }

    fn verdict(level: RiskLevel) -> SecurityVerdict {
        SecurityVerdict {
            level,
            ..Default::default()
        }
    }

    fn classified(label: DomainLabel) -> ClassificationResult {
        ClassificationResult {
            label,
            confidence: 0.9,
        }
    }

    #[test]
    fn high_confidence_clean_email_auto_creates() {
        let route = RoutingPolicy::new().route(
            &integration(true, false, 0.7),
            &verdict(RiskLevel::None),
            &classified(DomainLabel::Quote),
            0.95,
        );
        assert_eq!(route, Route::AutoCreate);
    }

    #[test]
    fn low_risk_verdict_still_auto_creates() {
        let route = RoutingPolicy::new().route(
            &integration(true, false, 0.7),
            &verdict(RiskLevel::Low),
            &classified(DomainLabel::Quote),
            0.95,
        );
        assert_eq!(route, Route::AutoCreate);
    }

    #[test]
    fn medium_verdict_queues_despite_high_confidence() {
        let route = RoutingPolicy::new().route(
            &integration(true, false, 0.7),
            &verdict(RiskLevel::Medium),
            &classified(DomainLabel::Quote),
            0.95,
        );
        match route {
            Route::QueueForConfirmation { reason } => {
                assert!(reason.contains("medium"), "reason: {reason}");
            }
            other => panic!("expected queue, got {other:?}"),
        }
    }

    #[test]
    fn low_confidence_queues() {
        let route = RoutingPolicy::new().route(
            &integration(true, false, 0.7),
            &verdict(RiskLevel::None),
            &classified(DomainLabel::Quote),
            0.3,
        );
        assert!(matches!(route, Route::QueueForConfirmation { .. }));
    }

    #[test]
    fn high_verdict_blocks_regardless_of_confidence() {
        let route = RoutingPolicy::new().route(
            &integration(true, false, 0.1),
            &verdict(RiskLevel::High),
            &classified(DomainLabel::Quote),
            0.99,
        );
        assert_eq!(route, Route::Blocked);
    }

    #[test]
    fn critical_verdict_blocks() {
        let route = RoutingPolicy::new().route(
            &integration(true, false, 0.1),
            &verdict(RiskLevel::Critical),
            &classified(DomainLabel::Quote),
            0.99,
        );
        assert_eq!(route, Route::Blocked);
    }

    #[test]
    fn require_confirmation_queues_even_at_high_confidence() {
        let route = RoutingPolicy::new().route(
            &integration(true, true, 0.7),
            &verdict(RiskLevel::None),
            &classified(DomainLabel::Quote),
            0.99,
        );
        assert!(matches!(route, Route::QueueForConfirmation { .. }));
    }

    #[test]
    fn auto_process_disabled_queues() {
        let route = RoutingPolicy::new().route(
            &integration(false, false, 0.7),
            &verdict(RiskLevel::None),
            &classified(DomainLabel::Quote),
            0.99,
        );
        assert!(matches!(route, Route::QueueForConfirmation { .. }));
    }

    #[test]
    fn unknown_domain_queues() {
        let route = RoutingPolicy::new().route(
            &integration(true, false, 0.7),
            &verdict(RiskLevel::None),
            &ClassificationResult::unknown(),
            0.0,
        );
        assert!(matches!(route, Route::QueueForConfirmation { .. }));
    }

    #[test]
    fn threshold_is_read_per_integration() {
        let policy = RoutingPolicy::new();
        let strict = policy.route(
            &integration(true, false, 0.9),
            &verdict(RiskLevel::None),
            &classified(DomainLabel::Quote),
            0.8,
        );
        let lax = policy.route(
            &integration(true, false, 0.5),
            &verdict(RiskLevel::None),
            &classified(DomainLabel::Quote),
            0.8,
        );
        assert!(matches!(strict, Route::QueueForConfirmation { .. }));
        assert_eq!(lax, Route::AutoCreate);
    }
}
