//! Scan orchestrator.
//!
//! Runs every analyzer for a target in parallel, each in its own task with
//! its own timeout, consults the signal cache before spawning anything,
//! aggregates the results and hands the finished scan to the store.
//! [`ScanOrchestrator::scan`] never fails: every problem is reflected in the
//! signals of the returned [`ScanResult`].

use crate::aggregator::aggregate;
use crate::analyzers::{
    Analyzer, ContentAnalyzer, DomainAnalyzer, KnownScamAnalyzer, SslAnalyzer, UrlPatternAnalyzer,
};
use crate::cache::{CacheKey, SignalCache};
use crate::error::{AnalyzerError, Result, ScanError};
use crate::http::{build_client, build_redirecting_client};
use crate::intel::RdapDomainIntel;
use athlethia_core::{
    AnalyzerKind, AppConfig, CacheScope, ConfigError, DomainIntel, NormalizedTarget,
    ScamDatabase, ScamRecord, ScanRequest, ScanResult, ScanStore, SignalResult, TargetError,
    TextClassifier, Verdict,
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Coordinates analyzers, cache, aggregation and persistence for scans.
pub struct ScanOrchestrator {
    /// Validated configuration
    config: Arc<AppConfig>,
    /// One analyzer per slot of `AnalyzerKind::ALL`, in that order
    analyzers: Vec<Arc<dyn Analyzer>>,
    /// Signal cache shared by all scans
    cache: Arc<SignalCache>,
    /// Destination for finished scans and community reports
    store: Option<Arc<dyn ScanStore>>,
    /// Client used by the content analyzer, kept to rebuild it with a classifier
    content_client: reqwest::Client,
    /// Intel source used by the domain analyzer
    domain_intel: Option<Arc<dyn DomainIntel>>,
}

impl ScanOrchestrator {
    /// Create an orchestrator with the built-in analyzers.
    ///
    /// The known-scam lookup is skipped until a database is attached with
    /// [`with_scam_database`](Self::with_scam_database) or
    /// [`with_database`](Self::with_database).
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the configuration does not validate.
    pub fn new(config: AppConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let content_client = build_client(&config.content, config.analyzers.content.timeout())
            .map_err(|e| client_error("content.user_agent", &e))?;
        let ssl_client =
            build_client(&config.content, config.analyzers.ssl_certificate.timeout())
                .map_err(|e| client_error("content.user_agent", &e))?;

        let domain_intel: Option<Arc<dyn DomainIntel>> = if config.domain.rdap_enabled {
            let rdap_client = build_redirecting_client(
                &config.content,
                config.analyzers.domain_reputation.timeout(),
                config.domain.rdap_max_redirects,
            )
            .map_err(|e| client_error("domain.rdap_base_url", &e))?;
            Some(Arc::new(RdapDomainIntel::new(
                rdap_client,
                config.domain.rdap_base_url.clone(),
            )))
        } else {
            None
        };

        let mut orchestrator = Self {
            analyzers: Vec::with_capacity(AnalyzerKind::ALL.len()),
            cache: Arc::new(SignalCache::new()),
            store: None,
            content_client,
            domain_intel,
            config: Arc::new(config),
        };

        let config = Arc::clone(&orchestrator.config);
        let url_pattern: Arc<dyn Analyzer> =
            Arc::new(UrlPatternAnalyzer::new(config.url_pattern.clone()));
        let ssl: Arc<dyn Analyzer> = Arc::new(SslAnalyzer::new(ssl_client));
        let known_scam: Arc<dyn Analyzer> =
            Arc::new(KnownScamAnalyzer::new(config.known_scam.clone(), None));
        orchestrator.analyzers = vec![
            url_pattern,
            orchestrator.domain_analyzer(),
            orchestrator.content_analyzer(None),
            ssl,
            known_scam,
        ];

        tracing::debug!(
            "Scan orchestrator ready (rdap: {}, thresholds: {}/{})",
            config.domain.rdap_enabled,
            config.scoring.low_threshold,
            config.scoring.high_threshold
        );
        Ok(orchestrator)
    }

    /// Attach a store that implements both persistence and known-scam lookups.
    #[must_use]
    pub fn with_database<D>(self, database: Arc<D>) -> Self
    where
        D: ScanStore + ScamDatabase + 'static,
    {
        let store: Arc<dyn ScanStore> = database.clone();
        let scams: Arc<dyn ScamDatabase> = database;
        self.with_store(store).with_scam_database(scams)
    }

    /// Persist finished scans and accept community reports.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ScanStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable the known-scam lookup against a database.
    #[must_use]
    pub fn with_scam_database(self, database: Arc<dyn ScamDatabase>) -> Self {
        let analyzer = KnownScamAnalyzer::new(self.config.known_scam.clone(), Some(database));
        self.with_analyzer(Arc::new(analyzer))
    }

    /// Blend an AI text classifier into content analysis.
    #[must_use]
    pub fn with_classifier(self, classifier: Arc<dyn TextClassifier>) -> Self {
        let analyzer = self.content_analyzer(Some(classifier));
        self.with_analyzer(analyzer)
    }

    /// Use a domain age/reputation source.
    #[must_use]
    pub fn with_domain_intel(mut self, intel: Arc<dyn DomainIntel>) -> Self {
        self.domain_intel = Some(intel);
        let analyzer = self.domain_analyzer();
        self.with_analyzer(analyzer)
    }

    /// Replace the analyzer occupying the slot of `analyzer.kind()`.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        match AnalyzerKind::ALL.iter().position(|k| *k == analyzer.kind()) {
            Some(slot) => self.analyzers[slot] = analyzer,
            None => tracing::warn!("Ignoring analyzer for non-scan slot {}", analyzer.kind()),
        }
        self
    }

    /// Share a cache between orchestrators.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<SignalCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The signal cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SignalCache> {
        &self.cache
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Start the background cache sweep if `cache.sweep_interval_secs` is non-zero.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start_cache_sweeper(&self) -> Option<JoinHandle<()>> {
        match self.config.cache.sweep_interval_secs {
            0 => None,
            secs => Some(self.cache.spawn_sweeper(Duration::from_secs(secs))),
        }
    }

    /// Classify one target.
    pub async fn scan(&self, request: ScanRequest) -> ScanResult {
        let started = Instant::now();

        let target = match NormalizedTarget::parse(&request.target) {
            Ok(target) => target,
            Err(e) => {
                let result = self.unparseable(request, &e);
                self.persist(&result).await;
                return result;
            }
        };

        let signals = join_all(
            self.analyzers
                .iter()
                .map(|analyzer| self.run_analyzer(Arc::clone(analyzer), &target)),
        )
        .await;

        let assessment = aggregate(&signals, &self.config.scoring);
        let cache_hit = signals.iter().all(|s| s.cache_hit);

        let result = ScanResult {
            id: Uuid::new_v4(),
            raw_target: request.target,
            target: Some(target),
            source_context: request.source_context,
            verdict: assessment.verdict,
            confidence: assessment.confidence,
            signals,
            computed_at: Utc::now(),
            cache_hit,
        };

        tracing::info!(
            url = %result.target_str(),
            verdict = %result.verdict,
            confidence = result.confidence,
            cache_hit,
            elapsed_ms = elapsed_ms(started),
            "Scan complete"
        );

        self.persist(&result).await;
        result
    }

    /// Record a community report for the host of `target` and return the updated record.
    ///
    /// Reports are filed under the host without `www.`, never the registrable
    /// domain, so one page on a shared hosting suffix does not flag its
    /// neighbours. Cached host- and domain-level signals covering that host
    /// are dropped so the next scan sees the new report count.
    pub async fn report(&self, target: &str, reporter_context: &str) -> Result<ScamRecord> {
        let target = NormalizedTarget::parse(target)?;
        let store = self.store.as_ref().ok_or(ScanError::NoStore)?;
        let domain = target.report_domain();

        let record = store.record_report(domain, reporter_context).await?;
        self.invalidate_domain(domain).await;

        tracing::info!(
            "Report recorded for {} ({} total, confirmed={})",
            domain,
            record.report_count,
            record.confirmed
        );
        Ok(record)
    }

    /// Drop cached host- and domain-level signals for `domain` and its subdomains.
    pub async fn invalidate_domain(&self, domain: &str) {
        for kind in AnalyzerKind::ALL
            .into_iter()
            .filter(|k| k.cache_scope() != CacheScope::Url)
        {
            let removed = self.cache.invalidate_within(kind, domain).await;
            if removed > 0 {
                tracing::debug!("Dropped {} cached {} signals for {}", removed, kind, domain);
            }
        }
    }

    async fn run_analyzer(
        &self,
        analyzer: Arc<dyn Analyzer>,
        target: &NormalizedTarget,
    ) -> SignalResult {
        let kind = analyzer.kind();
        let key = CacheKey::for_target(kind, target);

        let started = Instant::now();
        if let Some(mut cached) = self.cache.get(&key).await {
            tracing::debug!("Cache hit for {} on {}", kind, key.scope());
            cached.cache_hit = true;
            cached.duration_ms = elapsed_ms(started);
            return cached;
        }
        tracing::debug!("Cache miss for {} on {}", kind, key.scope());

        let settings = self.config.analyzers.get(kind);
        let task_target = target.clone();
        let mut handle = tokio::spawn(async move { analyzer.analyze(&task_target).await });

        let outcome = tokio::time::timeout(settings.timeout(), &mut handle).await;
        let (mut signal, ttl) = match outcome {
            Ok(Ok(Ok(output))) => {
                let ttl = if output.confirmed_scam {
                    Duration::from_secs(self.config.known_scam.confirmed_ttl_secs)
                } else {
                    settings.cache_ttl()
                };
                let signal = SignalResult::completed(kind, output.score, output.evidence)
                    .with_confirmed_scam(output.confirmed_scam);
                (signal, Some(ttl))
            }
            Ok(Ok(Err(AnalyzerError::NotApplicable(reason)))) => {
                tracing::debug!("{} skipped: {}", kind, reason);
                (SignalResult::skipped(kind, reason), None)
            }
            Ok(Ok(Err(e))) => {
                tracing::debug!("{} failed on {}: {}", kind, target, e);
                let ttl = e
                    .is_stable()
                    .then(|| Duration::from_secs(self.config.cache.negative_ttl_secs));
                (SignalResult::failed(kind, e.to_string()), ttl)
            }
            Ok(Err(join_error)) => {
                tracing::error!("{} task aborted abnormally: {}", kind, join_error);
                (
                    SignalResult::failed(kind, format!("analyzer crashed: {join_error}")),
                    None,
                )
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(
                    "{} timed out after {} ms on {}",
                    kind,
                    settings.timeout_ms,
                    target
                );
                (SignalResult::timed_out(kind, settings.timeout_ms), None)
            }
        };
        signal.duration_ms = elapsed_ms(started);

        if let Some(ttl) = ttl {
            self.cache.put(key, signal.clone(), ttl).await;
        }
        signal
    }

    fn unparseable(&self, request: ScanRequest, error: &TargetError) -> ScanResult {
        tracing::info!("Unparseable target {:?}: {}", request.target, error);
        let confidence = self.config.scoring.unparseable_confidence;
        ScanResult {
            id: Uuid::new_v4(),
            raw_target: request.target,
            target: None,
            source_context: request.source_context,
            verdict: Verdict::from_confidence(
                confidence,
                self.config.scoring.low_threshold,
                self.config.scoring.high_threshold,
            ),
            confidence,
            signals: vec![SignalResult::failed(
                AnalyzerKind::TargetParser,
                error.to_string(),
            )],
            computed_at: Utc::now(),
            cache_hit: false,
        }
    }

    async fn persist(&self, result: &ScanResult) {
        let Some(store) = &self.store else {
            return;
        };
        match tokio::time::timeout(self.config.persistence.timeout(), store.save(result)).await {
            Ok(Ok(())) => tracing::debug!("Persisted scan {}", result.id),
            Ok(Err(e)) => tracing::warn!("Failed to persist scan {}: {}", result.id, e),
            Err(_) => tracing::warn!(
                "Persisting scan {} timed out after {} ms",
                result.id,
                self.config.persistence.timeout_ms
            ),
        }
    }

    fn domain_analyzer(&self) -> Arc<dyn Analyzer> {
        let analyzer = DomainAnalyzer::new(self.config.domain.clone());
        match &self.domain_intel {
            Some(intel) => Arc::new(analyzer.with_intel(Arc::clone(intel))),
            None => Arc::new(analyzer),
        }
    }

    fn content_analyzer(&self, classifier: Option<Arc<dyn TextClassifier>>) -> Arc<dyn Analyzer> {
        let analyzer = ContentAnalyzer::new(
            self.content_client.clone(),
            self.config.content.clone(),
            self.config.url_pattern.brands.clone(),
        );
        match classifier {
            Some(classifier) => Arc::new(analyzer.with_classifier(classifier)),
            None => Arc::new(analyzer),
        }
    }
}

fn client_error(field: &str, error: &AnalyzerError) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: error.to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::AnalyzerOutput;
    use async_trait::async_trait;
    use athlethia_core::SignalStatus;

    struct Fixed(AnalyzerKind, f64);

    #[async_trait]
    impl Analyzer for Fixed {
        fn kind(&self) -> AnalyzerKind {
            self.0
        }

        async fn analyze(
            &self,
            _target: &NormalizedTarget,
        ) -> std::result::Result<AnalyzerOutput, AnalyzerError> {
            Ok(AnalyzerOutput::with_score(self.1, "fixed"))
        }
    }

    fn orchestrator() -> ScanOrchestrator {
        AnalyzerKind::ALL.into_iter().fold(
            ScanOrchestrator::new(AppConfig::default()).expect("valid config"),
            |orchestrator, kind| orchestrator.with_analyzer(Arc::new(Fixed(kind, 0.1))),
        )
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.scoring.low_threshold = 0.9;
        assert!(ScanOrchestrator::new(config).is_err());
    }

    #[tokio::test]
    async fn test_signals_follow_fixed_order() {
        let result = orchestrator().scan(ScanRequest::new("example.com", "test")).await;
        let kinds: Vec<_> = result.signals.iter().map(|s| s.analyzer).collect();
        assert_eq!(kinds, AnalyzerKind::ALL.to_vec());
        assert_eq!(result.verdict, Verdict::Safe);
    }

    #[tokio::test]
    async fn test_unparseable_target() {
        let result = orchestrator().scan(ScanRequest::new("   ", "test")).await;
        assert_eq!(result.verdict, Verdict::Suspicious);
        assert!(result.target.is_none());
        assert_eq!(result.signals.len(), 1);
        assert_eq!(result.signals[0].analyzer, AnalyzerKind::TargetParser);
        assert_eq!(result.signals[0].status, SignalStatus::Failed);
    }

    #[tokio::test]
    async fn test_report_without_store() {
        let err = orchestrator()
            .report("example.com", "test")
            .await
            .expect_err("no store");
        assert!(matches!(err, ScanError::NoStore));
    }

    #[tokio::test]
    async fn test_sweeper_respects_config() {
        let mut config = AppConfig::default();
        config.cache.sweep_interval_secs = 0;
        let orchestrator = ScanOrchestrator::new(config).expect("valid config");
        assert!(orchestrator.start_cache_sweeper().is_none());

        let handle = self::orchestrator()
            .start_cache_sweeper()
            .expect("sweeper running");
        handle.abort();
    }
}
