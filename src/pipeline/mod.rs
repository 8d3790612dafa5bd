//! Inbound email processing pipeline.
//!
//! Every delivery flows through the same strictly-sequential stages:
//! 1. `SecurityScanner::scan()` — adversarial-input gate, runs first
//! 2. `EmailClassifier::classify()` — business-domain label
//! 3. `FieldExtractor::extract()` — one strategy per domain
//! 4. `ConfidenceScorer::score()` — single [0,1] trust measure
//! 5. `RoutingPolicy::route()` — auto-create vs. queue vs. blocked
//! 6. `RecordCreator::create()` — the only mutation, insert-only
//! 7. Processing-log finalize + notification dispatch
//!
//! **The pipeline never updates or deletes an existing business record.**

pub mod extract;
pub mod processor;
pub mod routing;
pub mod scoring;
pub mod types;
