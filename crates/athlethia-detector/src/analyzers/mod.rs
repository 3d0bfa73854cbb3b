//! Signal analyzers.
//!
//! Each analyzer inspects one aspect of a [`NormalizedTarget`] and reports a
//! score in [0, 1] with human-readable evidence. Analyzers are independent:
//! none of them sees another's output, and a failure in one never affects
//! the others.

mod content;
mod domain;
mod known_scam;
mod ssl;
mod url_pattern;

pub use content::ContentAnalyzer;
pub use domain::DomainAnalyzer;
pub use known_scam::KnownScamAnalyzer;
pub use ssl::SslAnalyzer;
pub use url_pattern::UrlPatternAnalyzer;

use crate::error::AnalyzerError;
use async_trait::async_trait;
use athlethia_core::{AnalyzerKind, NormalizedTarget};

/// One independent scam signal.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Which slot of the scan result this analyzer fills.
    fn kind(&self) -> AnalyzerKind;

    /// Inspect a target.
    ///
    /// Return [`AnalyzerError::NotApplicable`] when there is nothing to check;
    /// the orchestrator reports that as a skipped signal.
    async fn analyze(&self, target: &NormalizedTarget) -> Result<AnalyzerOutput, AnalyzerError>;
}

/// What an analyzer found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerOutput {
    /// Score in [0, 1]
    pub score: f64,
    /// One line per indicator that fired
    pub evidence: Vec<String>,
    /// Set only by the known-scam lookup for confirmed records
    pub confirmed_scam: bool,
}

impl AnalyzerOutput {
    /// An empty output with score zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an indicator's weight and evidence. The score saturates at 1.0.
    pub fn add(&mut self, weight: f64, evidence: impl Into<String>) {
        self.score = (self.score + weight).min(1.0);
        self.evidence.push(evidence.into());
    }

    /// Add evidence without changing the score.
    pub fn note(&mut self, evidence: impl Into<String>) {
        self.evidence.push(evidence.into());
    }

    /// Output with a fixed score.
    #[must_use]
    pub fn with_score(score: f64, evidence: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            evidence: vec![evidence.into()],
            confirmed_scam: false,
        }
    }
}

/// Path and query words that suggest a credential or payment page.
pub(crate) const CREDENTIAL_KEYWORDS: &[&str] = &[
    "login", "signin", "sign-in", "logon", "verify", "verification", "account", "password",
    "secure", "update", "confirm", "banking", "wallet", "payment", "checkout", "billing",
    "unlock", "suspended",
];

/// First keyword from `keywords` found in `haystack` (already lowercased).
pub(crate) fn find_keyword<'a>(haystack: &str, keywords: &[&'a str]) -> Option<&'a str> {
    keywords.iter().copied().find(|k| haystack.contains(k))
}

/// Whether the registrable domain belongs to the brand, e.g. `paypal` for `paypal.com`.
pub(crate) fn is_brand_domain(registrable_domain: &str, brand: &str) -> bool {
    registrable_domain
        .split('.')
        .next()
        .is_some_and(|label| label == brand)
}
