//! Email classification — heuristics first, pluggable remote service second.
//!
//! The remote classifier/extractor (an AI service in production) sits behind
//! the narrow [`ClassifierService`] trait: `classify` and `extract`, both
//! bounded by an explicit timeout. Timeouts and errors are never fatal —
//! classification degrades to `Unknown` with confidence 0 and the delivery
//! queues for human confirmation instead of failing.

pub mod heuristics;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::pipeline::types::{ClassificationResult, DomainLabel, DomainScope};

pub use heuristics::Heuristics;

/// Fields + evidence returned by the remote extract call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteExtraction {
    /// Field name → value, as strings; the caller parses typed fields.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Field name → source snippet the model pointed at.
    #[serde(default)]
    pub evidence: BTreeMap<String, String>,
}

/// The pluggable classifier/extractor service.
///
/// Implementations do I/O; the heuristic fallback path never touches this
/// trait, so the pipeline is unit-testable without a network.
#[async_trait]
pub trait ClassifierService: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError>;

    async fn extract(
        &self,
        text: &str,
        domain: DomainLabel,
    ) -> Result<RemoteExtraction, ClassifierError>;
}

// ── Remote HTTP implementation ──────────────────────────────────────

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: String,
    confidence: f32,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
    domain: &'a str,
}

/// JSON-over-HTTP client for the external classification service.
pub struct RemoteClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl RemoteClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ClassifierService for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        let response = self
            .client
            .post(format!("{}/classify", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&ClassifyRequest { text })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ClassifierError::RequestFailed(e.to_string()))?;

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        if !(0.0..=1.0).contains(&parsed.confidence) {
            return Err(ClassifierError::InvalidResponse(format!(
                "confidence {} outside [0,1]",
                parsed.confidence
            )));
        }

        Ok(ClassificationResult {
            label: DomainLabel::parse(&parsed.label),
            confidence: parsed.confidence,
        })
    }

    async fn extract(
        &self,
        text: &str,
        domain: DomainLabel,
    ) -> Result<RemoteExtraction, ClassifierError> {
        let response = self
            .client
            .post(format!("{}/extract", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&ExtractRequest {
                text,
                domain: domain.as_str(),
            })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ClassifierError::RequestFailed(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))
    }
}

// ── Timeout wrapper ─────────────────────────────────────────────────

/// Bounds every call to the wrapped service with a hard timeout — the only
/// operation in the pipeline allowed to block for a non-trivial duration.
pub struct BoundedClassifier {
    inner: Arc<dyn ClassifierService>,
    timeout: Duration,
}

impl BoundedClassifier {
    pub fn new(inner: Arc<dyn ClassifierService>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        match tokio::time::timeout(self.timeout, self.inner.classify(text)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.timeout)),
        }
    }

    pub async fn extract(
        &self,
        text: &str,
        domain: DomainLabel,
    ) -> Result<RemoteExtraction, ClassifierError> {
        match tokio::time::timeout(self.timeout, self.inner.extract(text, domain)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.timeout)),
        }
    }
}

// ── Email classifier ────────────────────────────────────────────────

/// Assigns one business-domain label per scanned email.
///
/// Fixed-scope integrations classify trivially. Auto-detect integrations
/// run heuristics first and consult the remote service only for the
/// ambiguous remainder.
pub struct EmailClassifier {
    heuristics: Heuristics,
    remote: Option<BoundedClassifier>,
}

impl EmailClassifier {
    pub fn new(remote: Option<BoundedClassifier>) -> Self {
        Self {
            heuristics: Heuristics::new(),
            remote,
        }
    }

    /// Heuristics-only classifier (no remote service configured).
    pub fn heuristics_only() -> Self {
        Self::new(None)
    }

    pub async fn classify(
        &self,
        scope: DomainScope,
        subject: &str,
        body: &str,
    ) -> ClassificationResult {
        match scope {
            DomainScope::Fixed(label) => ClassificationResult {
                label,
                confidence: 1.0,
            },
            DomainScope::AutoDetect => {
                if let Some(result) = self.heuristics.classify(subject, body) {
                    debug!(label = result.label.as_str(), confidence = result.confidence, "heuristic classification");
                    return result;
                }

                let Some(remote) = &self.remote else {
                    return ClassificationResult::unknown();
                };

                let text = format!("{subject}\n\n{body}");
                match remote.classify(&text).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "remote classification failed, degrading to unknown");
                        ClassificationResult::unknown()
                    }
                }
            }
        }
    }

    /// Best-effort remote extraction for gap filling. `None` on any
    /// failure — local extraction stands on its own.
    pub async fn extract_remote(&self, label: DomainLabel, body: &str) -> Option<RemoteExtraction> {
        let remote = self.remote.as_ref()?;
        match remote.extract(body, label).await {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                warn!(error = %e, domain = label.as_str(), "remote extraction failed, keeping local fields");
                None
            }
        }
    }
}
