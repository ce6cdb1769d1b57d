//! Threat severity model and per-file classification
//!
//! Verdicts come from three stages checked in order: local signature match,
//! static rule match (currently a no-op stage, kept pluggable so it can be
//! re-enabled without reshaping the pipeline), and remote reputation.

use crate::hasher::DigestSet;
use crate::reputation::ReputationProvider;
use crate::signatures::SignatureStore;
use anyhow::Result;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Threat severity, ordered from least to most severe signal
///
/// `Unknown` sorts above `High`: it marks files the pipeline could not
/// classify at all, which deserves attention over any concrete verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThreatLevel {
    Clean,
    /// Reserved severity between Clean and Medium; no current stage emits it
    Low,
    Medium,
    High,
    Unknown,
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreatLevel::Clean => "Clean",
            ThreatLevel::Low => "Low",
            ThreatLevel::Medium => "Medium",
            ThreatLevel::High => "High",
            ThreatLevel::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Final classification for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub level: ThreatLevel,
    pub detail: String,
}

impl Verdict {
    pub fn new(level: ThreatLevel, detail: impl Into<String>) -> Self {
        Self {
            level,
            detail: detail.into(),
        }
    }

    /// Verdict for a file whose pipeline failed outright
    pub fn unknown(error: impl fmt::Display) -> Self {
        Self::new(ThreatLevel::Unknown, format!("Error: {}", error))
    }
}

/// Static rule matching stage.
///
/// Returns the names of matched rules for a file; an empty result means the
/// stage contributes nothing to the verdict. An engine failure (broken rule
/// set, scan error) propagates so the orchestrator can report the file as
/// `Unknown` instead of silently skipping the stage.
pub trait RuleEngine: Send + Sync {
    fn scan(&self, path: &Path) -> Result<Vec<String>>;
}

/// Rule matching is disabled; every scan reports no matches
pub struct NoopRuleEngine;

impl RuleEngine for NoopRuleEngine {
    fn scan(&self, _path: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Classify one file from its digests.
///
/// A signature match short-circuits everything else, including the remote
/// lookup. When the remote lookup fails or returns no usable data the
/// verdict falls through to Clean, matching the long-standing behavior of
/// the scanner (a questionable default, kept for compatibility). The only
/// error path is a rule engine failure, which the caller maps to `Unknown`.
pub fn classify(
    path: &Path,
    digests: &DigestSet,
    signatures: &SignatureStore,
    rules: &dyn RuleEngine,
    reputation: &dyn ReputationProvider,
) -> Result<Verdict> {
    if digests.values().any(|d| signatures.is_known(d)) {
        return Ok(Verdict::new(ThreatLevel::High, "Known malicious hash"));
    }

    let hits = rules.scan(path)?;
    if !hits.is_empty() {
        return Ok(Verdict::new(
            ThreatLevel::Medium,
            format!("Rule match: {}", hits.join(", ")),
        ));
    }

    let (malicious, suspicious) = reputation
        .lookup(digests.lookup_key())
        .map(|payload| analysis_stats(&payload))
        .unwrap_or((0, 0));

    if malicious > 0 {
        Ok(Verdict::new(ThreatLevel::High, "VT malicious"))
    } else if suspicious > 0 {
        Ok(Verdict::new(ThreatLevel::Medium, "VT suspicious"))
    } else {
        Ok(Verdict::new(ThreatLevel::Clean, "No threats"))
    }
}

/// Pull `(malicious, suspicious)` counts out of a VT v3 payload.
/// Any other shape reads as zero.
fn analysis_stats(payload: &Value) -> (u64, u64) {
    let stats = &payload["data"]["attributes"]["last_analysis_stats"];
    (
        stats["malicious"].as_u64().unwrap_or(0),
        stats["suspicious"].as_u64().unwrap_or(0),
    )
}
