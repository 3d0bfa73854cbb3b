//! Registrable-domain reputation: TLD tier, domain age and reputation feeds.

use super::{Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use athlethia_core::{AnalyzerKind, DomainConfig, DomainIntel, DomainIntelReport, NormalizedTarget};
use chrono::Utc;
use std::sync::Arc;

const RISKY_TLD: f64 = 0.30;
const IP_HOST: f64 = 0.50;

/// Evidence line used whenever intel is missing or failed.
pub(crate) const UNKNOWN_INTEL: &str = "unknown age/reputation";

/// Scores the registrable domain.
pub struct DomainAnalyzer {
    config: DomainConfig,
    intel: Option<Arc<dyn DomainIntel>>,
}

impl DomainAnalyzer {
    /// Analyzer using only local heuristics.
    #[must_use]
    pub fn new(config: DomainConfig) -> Self {
        Self {
            config,
            intel: None,
        }
    }

    /// Add an age/reputation source.
    #[must_use]
    pub fn with_intel(mut self, intel: Arc<dyn DomainIntel>) -> Self {
        self.intel = Some(intel);
        self
    }

    fn score_intel(&self, report: &DomainIntelReport, output: &mut AnalyzerOutput) {
        if report.registered_at.is_none() && report.reputation.is_none() {
            output.note(UNKNOWN_INTEL);
            return;
        }

        if let Some(registered_at) = report.registered_at {
            #[allow(clippy::cast_precision_loss)]
            let age_days = ((Utc::now() - registered_at).num_seconds().max(0) as f64) / 86_400.0;
            let score = self.config.max_age_score * (-age_days / self.config.age_decay_days).exp();
            if score >= 0.01 {
                output.add(score, format!("Domain registered {age_days:.0} days ago"));
            } else {
                output.note(format!("Established domain ({age_days:.0} days old)"));
            }
        }

        if let Some(reputation) = report.reputation {
            let reputation = if reputation.is_finite() {
                reputation.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let score = self.config.reputation_weight * reputation;
            if score > 0.0 {
                output.add(score, format!("Reputation feed score {reputation:.2}"));
            }
        }
    }
}

#[async_trait]
impl Analyzer for DomainAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::DomainReputation
    }

    async fn analyze(&self, target: &NormalizedTarget) -> Result<AnalyzerOutput, AnalyzerError> {
        let mut output = AnalyzerOutput::new();

        if target.is_ip_literal() {
            output.add(
                IP_HOST,
                format!("IP-literal host {} has no registered domain", target.host()),
            );
            return Ok(output);
        }

        let domain = target.registrable_domain();
        if let Some(tld) = target.tld() {
            let last_label = tld.rsplit('.').next().unwrap_or(tld);
            if self
                .config
                .risky_tlds
                .iter()
                .any(|risky| risky.eq_ignore_ascii_case(last_label))
            {
                output.add(RISKY_TLD, format!("High-risk TLD .{last_label}"));
            }
        }

        match &self.intel {
            Some(intel) => match intel.lookup(domain).await {
                Ok(report) => self.score_intel(&report, &mut output),
                Err(e) => {
                    tracing::debug!("Domain intel for {} unavailable: {}", domain, e);
                    output.note(UNKNOWN_INTEL);
                }
            },
            None => output.note(UNKNOWN_INTEL),
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use athlethia_core::CollaboratorError;
    use chrono::Duration;

    struct FixedIntel(DomainIntelReport);

    #[async_trait]
    impl DomainIntel for FixedIntel {
        async fn lookup(&self, _domain: &str) -> Result<DomainIntelReport, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenIntel;

    #[async_trait]
    impl DomainIntel for BrokenIntel {
        async fn lookup(&self, _domain: &str) -> Result<DomainIntelReport, CollaboratorError> {
            Err(CollaboratorError::unavailable("rdap", "connection refused"))
        }
    }

    fn target(raw: &str) -> NormalizedTarget {
        NormalizedTarget::parse(raw).expect("valid target")
    }

    async fn analyze(analyzer: &DomainAnalyzer, raw: &str) -> AnalyzerOutput {
        analyzer.analyze(&target(raw)).await.expect("domain analysis")
    }

    #[tokio::test]
    async fn test_risky_tld() {
        let analyzer = DomainAnalyzer::new(DomainConfig::default());
        let output = analyze(&analyzer, "https://free-prize.tk/").await;
        assert!((output.score - RISKY_TLD).abs() < 1e-9);
        assert!(output.evidence.iter().any(|e| e.contains(".tk")));
        assert!(output.evidence.iter().any(|e| e == UNKNOWN_INTEL));
    }

    #[tokio::test]
    async fn test_ip_host() {
        let analyzer = DomainAnalyzer::new(DomainConfig::default());
        let output = analyze(&analyzer, "http://10.0.0.1/").await;
        assert!((output.score - IP_HOST).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_intel_is_neutral() {
        let analyzer =
            DomainAnalyzer::new(DomainConfig::default()).with_intel(Arc::new(BrokenIntel));
        let output = analyze(&analyzer, "https://example.com/").await;
        assert!(output.score.abs() < f64::EPSILON);
        assert_eq!(output.evidence, vec![UNKNOWN_INTEL.to_string()]);
    }

    #[tokio::test]
    async fn test_young_domain_decays_smoothly() {
        let config = DomainConfig::default();
        let mut previous = f64::INFINITY;
        for days in [0, 7, 30, 90, 730] {
            let intel = FixedIntel(DomainIntelReport {
                registered_at: Some(Utc::now() - Duration::days(days)),
                reputation: None,
            });
            let analyzer = DomainAnalyzer::new(config.clone()).with_intel(Arc::new(intel));
            let output = analyze(&analyzer, "https://example.com/").await;
            assert!(output.score <= previous);
            assert!(output.score <= config.max_age_score + 1e-9);
            previous = output.score;
        }
        assert!(previous < 0.01);
    }

    #[tokio::test]
    async fn test_reputation_is_blended() {
        let intel = FixedIntel(DomainIntelReport {
            registered_at: None,
            reputation: Some(0.8),
        });
        let analyzer =
            DomainAnalyzer::new(DomainConfig::default()).with_intel(Arc::new(intel));
        let output = analyze(&analyzer, "https://example.com/").await;
        assert!((output.score - 0.4).abs() < 1e-9);
    }
}
