//! Community scam database lookup.

use super::{Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use athlethia_core::{AnalyzerKind, KnownScamConfig, NormalizedTarget, ScamDatabase, ScamRecord};
use std::sync::Arc;

/// Evidence prefix for confirmed records.
pub const CONFIRMED_EVIDENCE: &str = "Confirmed scam in the community database";

/// Looks the target up in the scam database.
pub struct KnownScamAnalyzer {
    config: KnownScamConfig,
    database: Option<Arc<dyn ScamDatabase>>,
}

impl KnownScamAnalyzer {
    /// Create the analyzer. Without a database every lookup is skipped.
    #[must_use]
    pub fn new(config: KnownScamConfig, database: Option<Arc<dyn ScamDatabase>>) -> Self {
        Self { config, database }
    }

    fn score(&self, record: &ScamRecord) -> AnalyzerOutput {
        if record.confirmed {
            let kind = record
                .scam_type
                .as_deref()
                .map(|t| format!(" ({t})"))
                .unwrap_or_default();
            let mut output = AnalyzerOutput::with_score(
                self.config.confirmed_score,
                format!("{CONFIRMED_EVIDENCE}: {}{kind}", record.domain),
            );
            output.confirmed_scam = true;
            return output;
        }

        let reports = f64::from(record.report_count);
        let score = self.config.max_unconfirmed_score
            * (1.0 - (-reports / self.config.report_saturation).exp());
        AnalyzerOutput::with_score(
            score,
            format!(
                "{} reported {} time(s) since {}",
                record.domain,
                record.report_count,
                record.first_seen.format("%Y-%m-%d")
            ),
        )
    }
}

/// Domains to look up, most specific first: host, host without `www.`, registrable domain.
fn lookup_candidates(target: &NormalizedTarget) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(3);
    let host = target.host().to_lowercase();
    let bare = host.strip_prefix("www.").map(str::to_string);
    for candidate in [Some(host), bare, Some(target.registrable_domain().to_lowercase())]
        .into_iter()
        .flatten()
    {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

#[async_trait]
impl Analyzer for KnownScamAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::KnownScamLookup
    }

    async fn analyze(&self, target: &NormalizedTarget) -> Result<AnalyzerOutput, AnalyzerError> {
        let Some(database) = &self.database else {
            return Err(AnalyzerError::NotApplicable(
                "no scam database configured".to_string(),
            ));
        };

        for candidate in lookup_candidates(target) {
            if let Some(record) = database.lookup(&candidate).await? {
                tracing::debug!(
                    "Known scam record for {}: {} report(s), confirmed={}",
                    candidate,
                    record.report_count,
                    record.confirmed
                );
                return Ok(self.score(&record));
            }
        }

        Ok(AnalyzerOutput::with_score(
            0.0,
            "No community reports for this domain",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use athlethia_core::CollaboratorError;
    use chrono::Utc;
    use std::collections::HashMap;

    struct MapDatabase(HashMap<String, ScamRecord>);

    #[async_trait]
    impl ScamDatabase for MapDatabase {
        async fn lookup(&self, domain: &str) -> Result<Option<ScamRecord>, CollaboratorError> {
            Ok(self.0.get(domain).cloned())
        }
    }

    struct DownDatabase;

    #[async_trait]
    impl ScamDatabase for DownDatabase {
        async fn lookup(&self, _domain: &str) -> Result<Option<ScamRecord>, CollaboratorError> {
            Err(CollaboratorError::unavailable("scam database", "pool closed"))
        }
    }

    fn record(domain: &str, report_count: u32, confirmed: bool) -> ScamRecord {
        ScamRecord {
            domain: domain.to_string(),
            report_count,
            first_seen: Utc::now(),
            confirmed,
            scam_type: confirmed.then(|| "phishing".to_string()),
        }
    }

    fn analyzer_with(records: Vec<ScamRecord>) -> KnownScamAnalyzer {
        let map = records.into_iter().map(|r| (r.domain.clone(), r)).collect();
        KnownScamAnalyzer::new(KnownScamConfig::default(), Some(Arc::new(MapDatabase(map))))
    }

    fn target(raw: &str) -> NormalizedTarget {
        NormalizedTarget::parse(raw).expect("valid target")
    }

    #[test]
    fn test_lookup_order() {
        assert_eq!(
            lookup_candidates(&target("https://www.shop.example.com/")),
            vec!["www.shop.example.com", "shop.example.com", "example.com"]
        );
        assert_eq!(lookup_candidates(&target("https://example.com/")), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_confirmed_record() {
        let analyzer = analyzer_with(vec![record("scam.example", 12, true)]);
        let output = analyzer
            .analyze(&target("https://login.scam.example/"))
            .await
            .expect("lookup");
        assert!(output.confirmed_scam);
        assert!((output.score - 0.99).abs() < 1e-9);
        assert!(output.evidence[0].starts_with(CONFIRMED_EVIDENCE));
        assert!(output.evidence[0].contains("(phishing)"));
    }

    #[tokio::test]
    async fn test_report_count_saturates() {
        let config = KnownScamConfig::default();
        let mut previous = 0.0;
        for count in [1, 3, 10, 100] {
            let analyzer = analyzer_with(vec![record("reported.example", count, false)]);
            let output = analyzer
                .analyze(&target("reported.example"))
                .await
                .expect("lookup");
            assert!(!output.confirmed_scam);
            assert!(output.score > previous);
            assert!(output.score < config.max_unconfirmed_score);
            previous = output.score;
        }
    }

    #[tokio::test]
    async fn test_no_record_is_clean() {
        let analyzer = analyzer_with(vec![]);
        let output = analyzer.analyze(&target("example.com")).await.expect("lookup");
        assert!(output.score.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_database_errors_propagate() {
        let analyzer =
            KnownScamAnalyzer::new(KnownScamConfig::default(), Some(Arc::new(DownDatabase)));
        let err = analyzer
            .analyze(&target("example.com"))
            .await
            .expect_err("database down");
        assert!(!err.is_stable());
    }

    #[tokio::test]
    async fn test_without_database_is_not_applicable() {
        let analyzer = KnownScamAnalyzer::new(KnownScamConfig::default(), None);
        let err = analyzer
            .analyze(&target("example.com"))
            .await
            .expect_err("no database");
        assert!(matches!(err, AnalyzerError::NotApplicable(_)));
    }
}
