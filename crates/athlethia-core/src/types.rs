//! Shared types used across Athlethia.
//!
//! Scan requests flow into the orchestrator, each analyzer produces one
//! [`SignalResult`], and the aggregate becomes a [`ScanResult`].

use crate::target::NormalizedTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A request to classify one target. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Raw URL or bare domain as submitted
    pub target: String,
    /// When the request was created
    pub requested_at: DateTime<Utc>,
    /// Opaque tag identifying the caller (e.g. "telegram", "whatsapp", "cli")
    pub source_context: String,
}

impl ScanRequest {
    /// Create a request stamped with the current time.
    #[must_use]
    pub fn new(target: impl Into<String>, source_context: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            requested_at: Utc::now(),
            source_context: source_context.into(),
        }
    }
}

/// The analyzers that contribute signals, in the fixed output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// Literal URL string heuristics
    UrlPattern,
    /// Registrable domain: TLD tier, age, reputation
    DomainReputation,
    /// Fetched page content
    Content,
    /// TLS certificate checks
    SslCertificate,
    /// Community scam database lookup
    KnownScamLookup,
    /// Synthetic signal produced when the target cannot be parsed
    TargetParser,
}

impl AnalyzerKind {
    /// Every real analyzer, in the order signals appear in a [`ScanResult`].
    pub const ALL: [AnalyzerKind; 5] = [
        Self::UrlPattern,
        Self::DomainReputation,
        Self::Content,
        Self::SslCertificate,
        Self::KnownScamLookup,
    ];

    /// Stable machine name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::UrlPattern => "url_pattern",
            Self::DomainReputation => "domain_reputation",
            Self::Content => "content",
            Self::SslCertificate => "ssl_certificate",
            Self::KnownScamLookup => "known_scam_lookup",
            Self::TargetParser => "target_parser",
        }
    }

    /// Human-readable label for chat replies.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::UrlPattern => "URL pattern",
            Self::DomainReputation => "Domain reputation",
            Self::Content => "Page content",
            Self::SslCertificate => "SSL certificate",
            Self::KnownScamLookup => "Known scam database",
            Self::TargetParser => "Link parser",
        }
    }

    /// Granularity at which this analyzer's signals are cached.
    ///
    /// Must match what the analyzer actually inspects: the known-scam lookup
    /// depends on the full host, domain reputation only on the registrable domain.
    #[must_use]
    pub fn cache_scope(self) -> CacheScope {
        match self {
            Self::DomainReputation => CacheScope::RegistrableDomain,
            Self::KnownScamLookup => CacheScope::Host,
            Self::UrlPattern | Self::Content | Self::SslCertificate | Self::TargetParser => {
                CacheScope::Url
            }
        }
    }
}

/// What part of a target a cached signal is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheScope {
    /// The full canonical URL
    Url,
    /// The host (with any `www.` kept)
    Host,
    /// The registrable domain shared by every subdomain
    RegistrableDomain,
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How an analyzer call settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    /// The analyzer produced a score
    Completed,
    /// The analyzer exceeded its timeout; score is unknown
    TimedOut,
    /// The analyzer hit an error; score is unknown
    Failed,
    /// The analyzer had nothing to check (e.g. no collaborator configured)
    Skipped,
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::TimedOut => write!(f, "TimedOut"),
            Self::Failed => write!(f, "Failed"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

/// One analyzer's independent assessment of a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    /// Analyzer that produced this signal
    pub analyzer: AnalyzerKind,
    /// Scam confidence in [0, 1]; meaningful only when `status` is `Completed`
    pub score: f64,
    /// Short human-readable findings, in the order they were observed
    pub evidence: Vec<String>,
    /// Outcome of the analyzer call
    pub status: SignalStatus,
    /// When the analyzer produced the result
    pub observed_at: DateTime<Utc>,
    /// Whether this signal was served from the signal cache
    #[serde(default)]
    pub cache_hit: bool,
    /// Wall time spent obtaining the signal in this scan
    #[serde(default)]
    pub duration_ms: u64,
    /// Set by the known-scam lookup when the domain is a confirmed scam
    #[serde(default)]
    pub confirmed_scam: bool,
}

impl SignalResult {
    /// A completed signal. The score is clamped into [0, 1]; non-finite scores become 0.
    #[must_use]
    pub fn completed(analyzer: AnalyzerKind, score: f64, evidence: Vec<String>) -> Self {
        Self::new(analyzer, sanitize_score(score), evidence, SignalStatus::Completed)
    }

    /// A signal whose analyzer failed.
    #[must_use]
    pub fn failed(analyzer: AnalyzerKind, reason: impl Into<String>) -> Self {
        Self::new(analyzer, 0.0, vec![reason.into()], SignalStatus::Failed)
    }

    /// A signal whose analyzer exceeded its timeout.
    #[must_use]
    pub fn timed_out(analyzer: AnalyzerKind, timeout_ms: u64) -> Self {
        Self::new(
            analyzer,
            0.0,
            vec![format!("no answer within {timeout_ms} ms")],
            SignalStatus::TimedOut,
        )
    }

    /// A signal for an analyzer that had nothing to check.
    #[must_use]
    pub fn skipped(analyzer: AnalyzerKind, reason: impl Into<String>) -> Self {
        Self::new(analyzer, 0.0, vec![reason.into()], SignalStatus::Skipped)
    }

    fn new(
        analyzer: AnalyzerKind,
        score: f64,
        evidence: Vec<String>,
        status: SignalStatus,
    ) -> Self {
        Self {
            analyzer,
            score,
            evidence,
            status,
            observed_at: Utc::now(),
            cache_hit: false,
            duration_ms: 0,
            confirmed_scam: false,
        }
    }

    /// Mark the signal as coming from a confirmed scam record.
    #[must_use]
    pub fn with_confirmed_scam(mut self, confirmed: bool) -> Self {
        self.confirmed_scam = confirmed;
        self
    }

    /// Whether the signal takes part in aggregation.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SignalStatus::Completed
    }
}

fn sanitize_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Final three-tier classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Below the low threshold
    Safe,
    /// Between the thresholds, or not enough data
    Suspicious,
    /// At or above the high threshold
    Scam,
}

impl Verdict {
    /// Map a confidence onto the verdict tiers.
    #[must_use]
    pub fn from_confidence(confidence: f64, low_threshold: f64, high_threshold: f64) -> Self {
        if confidence >= high_threshold {
            Self::Scam
        } else if confidence >= low_threshold {
            Self::Suspicious
        } else {
            Self::Safe
        }
    }

    /// Parse from string representation; unknown values map to `Suspicious`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "Safe" => Self::Safe,
            "Scam" => Self::Scam,
            _ => Self::Suspicious,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Suspicious => write!(f, "Suspicious"),
            Self::Scam => write!(f, "Scam"),
        }
    }
}

/// The aggregated outcome of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Unique identifier, used by the persistence layer
    pub id: Uuid,
    /// Target exactly as submitted
    pub raw_target: String,
    /// Canonical target; `None` when the input could not be parsed
    pub target: Option<NormalizedTarget>,
    /// Caller tag copied from the request
    pub source_context: String,
    /// Three-tier classification
    pub verdict: Verdict,
    /// Aggregated scam likelihood in [0, 1]
    pub confidence: f64,
    /// One slot per analyzer in [`AnalyzerKind::ALL`] order
    pub signals: Vec<SignalResult>,
    /// When aggregation finished
    pub computed_at: DateTime<Utc>,
    /// Whether every signal was served from the cache
    pub cache_hit: bool,
}

impl ScanResult {
    /// Canonical target string, falling back to the trimmed raw input.
    #[must_use]
    pub fn target_str(&self) -> &str {
        self.target
            .as_ref()
            .map_or_else(|| self.raw_target.trim(), NormalizedTarget::as_str)
    }

    /// Registrable domain of the target, if it could be parsed.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.target.as_ref().map(NormalizedTarget::registrable_domain)
    }

    /// Whether the verdict is `Scam`.
    #[must_use]
    pub fn is_scam(&self) -> bool {
        self.verdict == Verdict::Scam
    }

    /// The signal for a given analyzer, if present.
    #[must_use]
    pub fn signal(&self, analyzer: AnalyzerKind) -> Option<&SignalResult> {
        self.signals.iter().find(|s| s.analyzer == analyzer)
    }

    /// Flatten into the record chat and API layers render.
    #[must_use]
    pub fn to_report(&self) -> ScanReport {
        let evidence = self
            .signals
            .iter()
            .flat_map(|s| {
                let label = if s.is_completed() {
                    s.analyzer.display_name().to_string()
                } else {
                    format!("{} ({})", s.analyzer.display_name(), s.status)
                };
                s.evidence.iter().map(move |e| format!("{label}: {e}"))
            })
            .collect();

        let breakdown = self
            .signals
            .iter()
            .map(|s| SignalSummary {
                analyzer: s.analyzer,
                status: s.status,
                score: s.is_completed().then_some(s.score),
                cache_hit: s.cache_hit,
            })
            .collect();

        ScanReport {
            target: self.target_str().to_string(),
            verdict: self.verdict,
            confidence: self.confidence,
            evidence,
            breakdown,
        }
    }
}

/// Flat, render-ready view of a [`ScanResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Canonical target
    pub target: String,
    /// Three-tier classification
    pub verdict: Verdict,
    /// Aggregated scam likelihood
    pub confidence: f64,
    /// Evidence from every signal, prefixed with the analyzer label; signals
    /// that did not complete also carry their status
    pub evidence: Vec<String>,
    /// Per-signal breakdown in analyzer order
    pub breakdown: Vec<SignalSummary>,
}

/// One row of the per-signal breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    /// Analyzer
    pub analyzer: AnalyzerKind,
    /// How the analyzer settled
    pub status: SignalStatus,
    /// Score when completed
    pub score: Option<f64>,
    /// Served from cache
    pub cache_hit: bool,
}

/// A community-reported scam domain, owned by the scam database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScamRecord {
    /// Domain the record refers to
    pub domain: String,
    /// Number of community reports
    pub report_count: u32,
    /// When the domain was first reported
    pub first_seen: DateTime<Utc>,
    /// Whether a reviewer confirmed the domain as a scam
    pub confirmed: bool,
    /// Category such as `phishing`, `fake_shop`, `crypto_scam`, `user_reported`
    pub scam_type: Option<String>,
}
