//! Security scanner — screens inbound email for attempts to manipulate the
//! automated pipeline before any business logic runs.
//!
//! Forwarded email is untrusted input. Senders have tried to smuggle
//! instructions at the system ("approve my order", "ignore your policies",
//! "reveal the admin password"). The scanner matches subject + body against
//! a tiered pattern set; the verdict's level is the *maximum* matched tier,
//! not a sum — one critical hit outranks any number of low hits.
//!
//! The pattern set is configuration data: a built-in default compiled at
//! startup, optionally replaced by a JSON file of pattern/tier pairs.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum snippet length retained for audit display.
const SNIPPET_MAX_LEN: usize = 80;

/// Risk classification of an email's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// DB / display string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::None,
        }
    }
}

/// A configurable pattern/tier pair, as loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPattern {
    /// Regex source (compiled case-insensitively at load).
    pub pattern: String,
    /// Severity tier this pattern escalates to.
    pub tier: RiskLevel,
    /// Short description shown to operators.
    pub description: String,
    /// Whether a match means the sender is asking us to modify records.
    #[serde(default)]
    pub modification: bool,
}

/// A single pattern match, kept for audit display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternHit {
    /// The literal matched text (truncated).
    pub snippet: String,
    pub tier: RiskLevel,
    pub description: String,
}

/// Outcome of scanning one email. Never stored on its own — it travels
/// with the processing-log entry it belongs to.
#[derive(Debug, Clone, Default)]
pub struct SecurityVerdict {
    pub level: RiskLevel,
    pub hits: Vec<PatternHit>,
    /// Any matched pattern asked us to modify or delete existing records.
    pub is_modification_attempt: bool,
}

impl SecurityVerdict {
    /// HIGH and CRITICAL verdicts short-circuit the pipeline.
    pub fn blocks(&self) -> bool {
        self.level >= RiskLevel::High
    }

    /// Compact summary for the processing-log row.
    pub fn summary(&self) -> Option<String> {
        if self.hits.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .hits
            .iter()
            .map(|h| format!("{} [{}]: \"{}\"", h.description, h.tier.as_str(), h.snippet))
            .collect();
        Some(parts.join("; "))
    }
}

struct CompiledPattern {
    regex: Regex,
    tier: RiskLevel,
    description: String,
    modification: bool,
}

/// Scans raw subject/body text for manipulation attempts.
///
/// Pure: `scan` has no side effects and touches no I/O.
pub struct SecurityScanner {
    patterns: Vec<CompiledPattern>,
}

impl SecurityScanner {
    /// Build a scanner from pattern/tier pairs.
    pub fn from_patterns(patterns: Vec<SecurityPattern>) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for p in patterns {
            let regex = Regex::new(&format!("(?i){}", p.pattern)).map_err(|e| {
                ConfigError::InvalidPattern {
                    pattern: p.pattern.clone(),
                    message: e.to_string(),
                }
            })?;
            compiled.push(CompiledPattern {
                regex,
                tier: p.tier,
                description: p.description,
                modification: p.modification,
            });
        }
        Ok(Self { patterns: compiled })
    }

    /// Load a pattern set from a JSON file (array of [`SecurityPattern`]).
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let patterns: Vec<SecurityPattern> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::from_patterns(patterns)
    }

    /// Scanner with the built-in pattern set.
    pub fn with_default_patterns() -> Self {
        // Built-in patterns are known-good; from_patterns can't fail on them.
        Self::from_patterns(default_patterns()).unwrap_or(Self { patterns: vec![] })
    }

    /// Scan subject + body. The verdict's level is the maximum matched tier.
    pub fn scan(&self, subject: &str, body: &str) -> SecurityVerdict {
        let mut verdict = SecurityVerdict::default();

        for text in [subject, body] {
            for pattern in &self.patterns {
                if let Some(m) = pattern.regex.find(text) {
                    let snippet = truncate(m.as_str(), SNIPPET_MAX_LEN);
                    verdict.level = verdict.level.max(pattern.tier);
                    verdict.is_modification_attempt |= pattern.modification;
                    verdict.hits.push(PatternHit {
                        snippet,
                        tier: pattern.tier,
                        description: pattern.description.clone(),
                    });
                }
            }
        }

        verdict
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// The built-in pattern set, grouped by tier.
pub fn default_patterns() -> Vec<SecurityPattern> {
    let p = |pattern: &str, tier: RiskLevel, description: &str, modification: bool| {
        SecurityPattern {
            pattern: pattern.into(),
            tier,
            description: description.into(),
            modification,
        }
    };

    vec![
        // Critical: direct commands at the automated system.
        p(
            r"\b(ignore|disregard|forget)\b.{0,40}\b(previous|prior|earlier|above|all)\b.{0,20}\b(instruction|prompt|message|rule)",
            RiskLevel::Critical,
            "instruction override attempt",
            false,
        ),
        p(
            r"\bapprove\b.{0,30}\b(order|quote|refund|payment|invoice)",
            RiskLevel::Critical,
            "approval command",
            true,
        ),
        p(
            r"\b(delete|remove|erase|cancel)\b.{0,40}\b(order|orders|record|records|account|quote|quotes|invoice|customer)",
            RiskLevel::Critical,
            "record deletion command",
            true,
        ),
        p(
            r"\b(transfer|wire|send)\b.{0,25}\b(funds|money|payment)\b.{0,30}\b(now|immediately|today|urgent)",
            RiskLevel::Critical,
            "funds transfer demand",
            true,
        ),
        p(
            r"\b(reveal|disclose|show|share|print)\b.{0,30}\b(credential|password|api.?key|secret|system prompt)",
            RiskLevel::Critical,
            "credential disclosure request",
            false,
        ),
        p(
            r"\brefund\b.{0,20}\bimmediately\b",
            RiskLevel::Critical,
            "immediate refund demand",
            true,
        ),
        // High: policy/authority manipulation.
        p(
            r"\b(ignore|disregard|bypass|override)\b.{0,30}\b(polic|rule|restriction|guideline|instruction)",
            RiskLevel::High,
            "policy override attempt",
            false,
        ),
        p(
            r"\bas (the|an?) (administrator|admin|owner|manager)\b.{0,40}\b(i (authorize|instruct|order|demand))",
            RiskLevel::High,
            "authority impersonation",
            false,
        ),
        p(
            r"\bmark\b.{0,25}\b(order|invoice|quote)\b.{0,15}\b(paid|approved|complete)",
            RiskLevel::High,
            "status manipulation command",
            true,
        ),
        // Medium: role-play / pressure framing.
        p(
            r"\byou are now\b|\bact as\b|\bpretend to be\b",
            RiskLevel::Medium,
            "role reassignment attempt",
            false,
        ),
        p(
            r"\burgent(ly)?\b.{0,25}\b(wire|payment|action required)",
            RiskLevel::Medium,
            "urgency pressure",
            false,
        ),
        // Low: hedging language worth flagging, not blocking.
        p(
            r"\b(between you and me|don't tell anyone|keep this (quiet|secret|between us))",
            RiskLevel::Low,
            "secrecy hedging",
            false,
        ),
        p(
            r"\bthis is (just )?a test of (your|the) system\b",
            RiskLevel::Low,
            "system probing",
            false,
        ),
    ]
}
